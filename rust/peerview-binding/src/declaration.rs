//! Declaration identities that metadata is attached to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of declaration a piece of metadata may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationTarget {
    Type,
    Method,
    Parameter,
    Annotation,
}

/// Identifies one binding declaration.
///
/// Methods are scoped by their owning type, parameters by their method, so
/// [`DeclarationId::enclosing`] walks outwards from a parameter to its type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclarationId {
    Type {
        name: String,
    },
    Method {
        owner: String,
        name: String,
    },
    Parameter {
        owner: String,
        method: String,
        index: u32,
    },
    /// A named metadata declaration, usable as a shorthand at other sites.
    Annotation {
        name: String,
    },
}

impl DeclarationId {
    pub fn type_decl(name: impl Into<String>) -> DeclarationId {
        DeclarationId::Type { name: name.into() }
    }

    pub fn method(owner: impl Into<String>, name: impl Into<String>) -> DeclarationId {
        DeclarationId::Method {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn parameter(
        owner: impl Into<String>,
        method: impl Into<String>,
        index: u32,
    ) -> DeclarationId {
        DeclarationId::Parameter {
            owner: owner.into(),
            method: method.into(),
            index,
        }
    }

    pub fn annotation(name: impl Into<String>) -> DeclarationId {
        DeclarationId::Annotation { name: name.into() }
    }

    pub fn target(&self) -> DeclarationTarget {
        match self {
            DeclarationId::Type { .. } => DeclarationTarget::Type,
            DeclarationId::Method { .. } => DeclarationTarget::Method,
            DeclarationId::Parameter { .. } => DeclarationTarget::Parameter,
            DeclarationId::Annotation { .. } => DeclarationTarget::Annotation,
        }
    }

    /// The declaration this one is nested in, if any.
    pub fn enclosing(&self) -> Option<DeclarationId> {
        match self {
            DeclarationId::Method { owner, .. } => Some(DeclarationId::type_decl(owner.clone())),
            DeclarationId::Parameter { owner, method, .. } => {
                Some(DeclarationId::method(owner.clone(), method.clone()))
            }
            DeclarationId::Type { .. } | DeclarationId::Annotation { .. } => None,
        }
    }

    /// This declaration followed by all of its enclosing declarations.
    pub fn scopes(&self) -> impl Iterator<Item = DeclarationId> {
        std::iter::successors(Some(self.clone()), DeclarationId::enclosing)
    }
}

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationId::Type { name } => write!(f, "{name}"),
            DeclarationId::Method { owner, name } => write!(f, "{owner}::{name}"),
            DeclarationId::Parameter {
                owner,
                method,
                index,
            } => write!(f, "{owner}::{method}#{index}"),
            DeclarationId::Annotation { name } => write!(f, "@{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes() {
        let param = DeclarationId::parameter("Tensor", "fill", 0);
        let scopes: Vec<_> = param.scopes().collect();
        assert_eq!(
            scopes,
            vec![
                DeclarationId::parameter("Tensor", "fill", 0),
                DeclarationId::method("Tensor", "fill"),
                DeclarationId::type_decl("Tensor"),
            ]
        );
        assert_eq!(DeclarationId::annotation("StdVector").scopes().count(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(DeclarationId::method("Tensor", "fill").to_string(), "Tensor::fill");
        assert_eq!(
            DeclarationId::parameter("Tensor", "fill", 2).to_string(),
            "Tensor::fill#2"
        );
        assert_eq!(DeclarationId::annotation("StdString").to_string(), "@StdString");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&DeclarationId::method("Tensor", "fill")).unwrap();
        assert_eq!(json, r#"{"kind":"method","owner":"Tensor","name":"fill"}"#);
        let back: DeclarationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.target(), DeclarationTarget::Method);
    }
}
