//! The resolved metadata handed to the foreign-code generator.

use peerview_common::{Result, error::Error};
use serde::{Deserialize, Serialize};

use crate::{declaration::DeclarationId, descriptor::ResolvedAdapter};

/// Every resolved adapter site and every "no deallocator" scope, sorted by
/// declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorManifest {
    pub adapters: Vec<ResolvedAdapter>,
    pub no_deallocator: Vec<DeclarationId>,
}

impl GeneratorManifest {
    /// The adapter resolved for `site`, if any.
    pub fn adapter_for(&self, site: &DeclarationId) -> Option<&ResolvedAdapter> {
        self.adapters.iter().find(|adapter| &adapter.site == site)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::serialization("generator manifest", e))
    }

    pub fn from_json(json: &str) -> Result<GeneratorManifest> {
        serde_json::from_str(json).map_err(|e| Error::serialization("generator manifest", e))
    }
}
