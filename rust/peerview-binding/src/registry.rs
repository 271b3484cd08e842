//! `BindingRegistry`: metadata attached to binding declarations.
//!
//! Metadata is declared once per declaration and never changes afterwards.
//! Resolution happens when the generator (or an allocation path) asks for it:
//!
//! - [`BindingRegistry::resolve_adapter`] flattens shorthand annotations into
//!   the concrete descriptor they expand to. The innermost concrete descriptor
//!   supplies the adapter type; the outermost explicit argument count wins.
//! - [`BindingRegistry::deallocation_policy`] combines the "no deallocator"
//!   flags of a declaration and every declaration enclosing it.

use std::collections::{BTreeMap, BTreeSet};

use bytemuck::Pod;
use log::debug;
use peerview_common::{Result, error::Error};
use peerview_memory::{DeallocationPolicy, ForeignRuntime, TypedAccessor};

use crate::{
    declaration::{DeclarationId, DeclarationTarget},
    descriptor::{AdapterDescriptor, AdapterMetadata, ResolvedAdapter, validate_argument_count},
    manifest::GeneratorManifest,
};

/// Annotation expanding to the standard string adapter.
pub const STD_STRING: &str = "StdString";
/// Annotation expanding to the standard vector adapter.
pub const STD_VECTOR: &str = "StdVector";
/// Foreign type name of the standard string adapter.
pub const STRING_ADAPTER: &str = "StringAdapter";
/// Foreign type name of the standard vector adapter.
pub const VECTOR_ADAPTER: &str = "VectorAdapter";

/// Metadata attached to binding declarations.
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    adapters: BTreeMap<DeclarationId, AdapterMetadata>,
    no_deallocator: BTreeSet<DeclarationId>,
}

impl BindingRegistry {
    pub fn new() -> BindingRegistry {
        BindingRegistry::default()
    }

    /// Creates a registry with the `StdString` and `StdVector` shorthands
    /// declared.
    pub fn with_standard_adapters() -> BindingRegistry {
        let mut registry = BindingRegistry::new();
        for (annotation, adapter) in [(STD_STRING, STRING_ADAPTER), (STD_VECTOR, VECTOR_ADAPTER)] {
            registry
                .adapters
                .insert(DeclarationId::annotation(annotation), standard(adapter));
        }
        registry
    }

    /// Attaches a concrete adapter descriptor to `decl`.
    pub fn declare_adapter(
        &mut self,
        decl: DeclarationId,
        descriptor: AdapterDescriptor,
    ) -> Result<&mut BindingRegistry> {
        self.declare_adapter_metadata(decl, AdapterMetadata::Concrete(descriptor))
    }

    /// Attaches a use of the `annotation` shorthand to `decl`, optionally
    /// overriding the argument count the annotation resolves to.
    pub fn declare_shorthand(
        &mut self,
        decl: DeclarationId,
        annotation: impl Into<String>,
        argument_count: Option<u32>,
    ) -> Result<&mut BindingRegistry> {
        self.declare_adapter_metadata(
            decl,
            AdapterMetadata::Shorthand {
                annotation: annotation.into(),
                argument_count,
            },
        )
    }

    /// Attaches adapter metadata to `decl`.
    ///
    /// Adapter metadata targets methods, parameters and annotations, and may be
    /// declared at most once per declaration.
    pub fn declare_adapter_metadata(
        &mut self,
        decl: DeclarationId,
        metadata: AdapterMetadata,
    ) -> Result<&mut BindingRegistry> {
        check_target(
            &decl,
            &[
                DeclarationTarget::Method,
                DeclarationTarget::Parameter,
                DeclarationTarget::Annotation,
            ],
            "adapter",
        )?;
        if let AdapterMetadata::Shorthand {
            annotation,
            argument_count,
        } = &metadata
        {
            if annotation.trim().is_empty() {
                return Err(Error::invalid_declaration(
                    decl.to_string(),
                    "shorthand annotation name must not be empty",
                ));
            }
            if let Some(count) = argument_count {
                validate_argument_count(&decl.to_string(), *count)?;
            }
        }
        if self.adapters.contains_key(&decl) {
            return Err(Error::invalid_declaration(
                decl.to_string(),
                "adapter metadata is already declared",
            ));
        }
        self.adapters.insert(decl, metadata);
        Ok(self)
    }

    /// Marks `decl` as "no deallocator": views allocated under it do not own
    /// their memory.
    ///
    /// Targets types and methods.
    pub fn declare_no_deallocator(&mut self, decl: DeclarationId) -> Result<&mut BindingRegistry> {
        check_target(
            &decl,
            &[DeclarationTarget::Type, DeclarationTarget::Method],
            "no-deallocator",
        )?;
        if !self.no_deallocator.insert(decl.clone()) {
            return Err(Error::invalid_declaration(
                decl.to_string(),
                "no-deallocator is already declared",
            ));
        }
        Ok(self)
    }

    /// The adapter metadata declared directly on `decl`, unresolved.
    pub fn adapter_metadata(&self, decl: &DeclarationId) -> Option<&AdapterMetadata> {
        self.adapters.get(decl)
    }

    /// Resolves the adapter of `decl` by flattening shorthand chains.
    ///
    /// Returns `None` if no adapter metadata is attached to `decl`. Fails if a
    /// shorthand names an annotation without adapter metadata, or if shorthands
    /// form a cycle.
    pub fn resolve_adapter(&self, decl: &DeclarationId) -> Result<Option<ResolvedAdapter>> {
        let Some(mut metadata) = self.adapters.get(decl) else {
            return Ok(None);
        };
        let mut via: Vec<String> = Vec::new();
        let mut argument_count_override = None;
        loop {
            match metadata {
                AdapterMetadata::Concrete(descriptor) => {
                    return Ok(Some(ResolvedAdapter {
                        site: decl.clone(),
                        foreign_type_name: descriptor.foreign_type_name().to_string(),
                        argument_count: argument_count_override
                            .unwrap_or(descriptor.argument_count()),
                        via,
                    }));
                }
                AdapterMetadata::Shorthand {
                    annotation,
                    argument_count,
                } => {
                    if via.contains(annotation) {
                        return Err(Error::invalid_declaration(
                            decl.to_string(),
                            format!("shorthand cycle through @{annotation}"),
                        ));
                    }
                    argument_count_override = argument_count_override.or(*argument_count);
                    metadata = self
                        .adapters
                        .get(&DeclarationId::annotation(annotation.as_str()))
                        .ok_or_else(|| {
                            Error::invalid_declaration(
                                decl.to_string(),
                                format!("@{annotation} does not declare an adapter"),
                            )
                        })?;
                    via.push(annotation.clone());
                }
            }
        }
    }

    /// Whether "no deallocator" is declared on `decl` itself.
    pub fn has_no_deallocator(&self, decl: &DeclarationId) -> bool {
        self.no_deallocator.contains(decl)
    }

    /// The deallocation policy for allocations made under `decl`, taking
    /// enclosing declarations into account.
    pub fn deallocation_policy(&self, decl: &DeclarationId) -> DeallocationPolicy {
        decl.scopes()
            .map(|scope| DeallocationPolicy::from_no_deallocator(self.has_no_deallocator(&scope)))
            .fold(DeallocationPolicy::Attach, DeallocationPolicy::combine)
    }

    /// Allocates `capacity` elements for the allocator declaration `decl`,
    /// honoring its deallocation policy.
    pub fn allocate<T: Pod>(
        &self,
        decl: &DeclarationId,
        runtime: &ForeignRuntime,
        capacity: usize,
    ) -> Result<TypedAccessor<T>> {
        let policy = self.deallocation_policy(decl);
        debug!("allocating {capacity} elements for {decl} with policy {policy:?}");
        TypedAccessor::allocate_with_policy(runtime, capacity, policy)
    }

    /// Resolves every declaration into a manifest for the generator.
    ///
    /// Annotation declarations are definitions rather than call sites, so only
    /// methods and parameters appear in the adapter list.
    pub fn manifest(&self) -> Result<GeneratorManifest> {
        let mut adapters = Vec::new();
        for decl in self.adapters.keys() {
            if decl.target() == DeclarationTarget::Annotation {
                continue;
            }
            if let Some(resolved) = self.resolve_adapter(decl)? {
                adapters.push(resolved);
            }
        }
        Ok(GeneratorManifest {
            adapters,
            no_deallocator: self.no_deallocator.iter().cloned().collect(),
        })
    }
}

fn standard(adapter: &'static str) -> AdapterMetadata {
    AdapterMetadata::Concrete(AdapterDescriptor::builtin(adapter))
}

fn check_target(decl: &DeclarationId, allowed: &[DeclarationTarget], metadata: &str) -> Result<()> {
    if allowed.contains(&decl.target()) {
        Ok(())
    } else {
        Err(Error::invalid_declaration(
            decl.to_string(),
            format!("{metadata} metadata cannot target a {:?}", decl.target()),
        ))
    }
}
