//! Adapter descriptors and their resolved form.

use peerview_common::{Result, error::Error};
use serde::{Deserialize, Serialize};

use crate::declaration::DeclarationId;

/// Number of call arguments an adapter constructor takes when not specified.
pub const DEFAULT_ARGUMENT_COUNT: u32 = 1;

/// Names the foreign adapter type instantiated at a call site, and how many
/// leading call arguments feed its constructor.
///
/// The first argument supplies the pointer/size pair; an `argument_count`
/// above one hands further arguments to the constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAdapterDescriptor")]
pub struct AdapterDescriptor {
    foreign_type_name: String,
    argument_count: u32,
}

impl AdapterDescriptor {
    /// Creates a descriptor with the default argument count.
    pub fn new(foreign_type_name: impl Into<String>) -> Result<AdapterDescriptor> {
        AdapterDescriptor::with_argument_count(foreign_type_name, DEFAULT_ARGUMENT_COUNT)
    }

    /// Builds a descriptor for a name known to be valid, with the default
    /// argument count.
    pub(crate) fn builtin(foreign_type_name: &'static str) -> AdapterDescriptor {
        debug_assert!(!foreign_type_name.trim().is_empty());
        AdapterDescriptor {
            foreign_type_name: foreign_type_name.to_owned(),
            argument_count: DEFAULT_ARGUMENT_COUNT,
        }
    }

    pub fn with_argument_count(
        foreign_type_name: impl Into<String>,
        argument_count: u32,
    ) -> Result<AdapterDescriptor> {
        let foreign_type_name = foreign_type_name.into();
        if foreign_type_name.trim().is_empty() {
            return Err(Error::invalid_declaration(
                "adapter",
                "foreign type name must not be empty",
            ));
        }
        validate_argument_count(&foreign_type_name, argument_count)?;
        Ok(AdapterDescriptor {
            foreign_type_name,
            argument_count,
        })
    }

    #[inline]
    pub fn foreign_type_name(&self) -> &str {
        &self.foreign_type_name
    }

    #[inline]
    pub fn argument_count(&self) -> u32 {
        self.argument_count
    }
}

#[derive(Deserialize)]
struct RawAdapterDescriptor {
    foreign_type_name: String,
    #[serde(default = "default_argument_count")]
    argument_count: u32,
}

fn default_argument_count() -> u32 {
    DEFAULT_ARGUMENT_COUNT
}

impl TryFrom<RawAdapterDescriptor> for AdapterDescriptor {
    type Error = Error;

    fn try_from(raw: RawAdapterDescriptor) -> Result<Self> {
        AdapterDescriptor::with_argument_count(raw.foreign_type_name, raw.argument_count)
    }
}

pub(crate) fn validate_argument_count(declaration: &str, argument_count: u32) -> Result<()> {
    if argument_count == 0 {
        return Err(Error::invalid_declaration(
            declaration,
            "argument count must be at least 1",
        ));
    }
    Ok(())
}

/// Adapter metadata as attached to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum AdapterMetadata {
    /// A fully specified descriptor.
    Concrete(AdapterDescriptor),
    /// A use of a named annotation that itself carries adapter metadata,
    /// optionally overriding its argument count.
    Shorthand {
        annotation: String,
        argument_count: Option<u32>,
    },
}

impl AdapterMetadata {
    pub fn shorthand(annotation: impl Into<String>) -> AdapterMetadata {
        AdapterMetadata::Shorthand {
            annotation: annotation.into(),
            argument_count: None,
        }
    }

    pub fn shorthand_with_argument_count(
        annotation: impl Into<String>,
        argument_count: u32,
    ) -> AdapterMetadata {
        AdapterMetadata::Shorthand {
            annotation: annotation.into(),
            argument_count: Some(argument_count),
        }
    }
}

/// The flattened adapter of one declaration, as handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAdapter {
    /// The declaration the adapter applies to.
    pub site: DeclarationId,
    pub foreign_type_name: String,
    pub argument_count: u32,
    /// Annotations expanded on the way to the concrete descriptor, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<String>,
}

impl ResolvedAdapter {
    /// The resolved fields as a descriptor.
    pub fn descriptor(&self) -> Result<AdapterDescriptor> {
        AdapterDescriptor::with_argument_count(&self.foreign_type_name, self.argument_count)
    }
}
