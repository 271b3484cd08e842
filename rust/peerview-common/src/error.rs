use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn allocation(requested_bytes: usize, reason: impl Into<String>) -> Error {
        Error(
            ErrorKind::Allocation {
                requested_bytes,
                reason: reason.into(),
            }
            .into(),
        )
    }

    pub fn runtime_not_loaded() -> Error {
        Error(ErrorKind::RuntimeNotLoaded.into())
    }

    pub fn bounds(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Bounds {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_declaration(
        declaration: impl Into<String>,
        message: impl Into<String>,
    ) -> Error {
        Error(
            ErrorKind::InvalidDeclaration {
                declaration: declaration.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn serialization<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Serialization {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }

    /// Returns `true` for failures of the foreign allocator, including the case
    /// where no allocator has been installed yet.
    pub fn is_allocation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Allocation { .. } | ErrorKind::RuntimeNotLoaded
        )
    }

    /// Returns `true` for index and window violations.
    pub fn is_bounds(&self) -> bool {
        matches!(self.kind(), ErrorKind::Bounds { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("foreign allocation of {requested_bytes} bytes failed: {reason}")]
    Allocation {
        requested_bytes: usize,
        reason: String,
    },

    #[error("no foreign runtime is loaded (has ForeignRuntime::load() been called?)")]
    RuntimeNotLoaded,

    #[error("out of bounds {name}: {message}")]
    Bounds { name: String, message: String },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid declaration '{declaration}': {message}")]
    InvalidDeclaration {
        declaration: String,
        message: String,
    },

    #[error("serialization error: {context}")]
    Serialization {
        context: String,
        source: StdErrorBoxed,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::allocation(16, "refused").is_allocation());
        assert!(Error::runtime_not_loaded().is_allocation());
        assert!(!Error::runtime_not_loaded().is_bounds());
        assert!(Error::bounds("index", "5 >= 4").is_bounds());
        assert!(!Error::invalid_arg("alignment", "not a power of two").is_bounds());
    }

    #[test]
    fn test_error_display() {
        let e = Error::bounds("limit", "7 > capacity 4");
        assert_eq!(e.to_string(), "out of bounds limit: 7 > capacity 4");

        let e = Error::invalid_declaration("Annotation(StdVector)", "empty name");
        assert_eq!(
            e.to_string(),
            "invalid declaration 'Annotation(StdVector)': empty name"
        );
    }

    #[test]
    fn test_into_kind() {
        match Error::allocation(32, "quota").into_kind() {
            ErrorKind::Allocation {
                requested_bytes,
                reason,
            } => {
                assert_eq!(requested_bytes, 32);
                assert_eq!(reason, "quota");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
