//! Declarative binding metadata consumed by foreign-code generators.
//!
//! Binding authors attach metadata to declarations (types, methods, parameters
//! and named annotations) in a [`BindingRegistry`](registry::BindingRegistry):
//!
//! - adapter descriptors, naming the foreign adapter type that converts a host
//!   value at a call site and the number of call arguments its constructor takes,
//! - the "no deallocator" flag, suppressing the deallocation hook of views
//!   allocated under a type or allocator method.
//!
//! The registry resolves shorthand chains into concrete descriptors and exports
//! them as a [`GeneratorManifest`](manifest::GeneratorManifest).

pub mod adapter;
pub mod declaration;
pub mod descriptor;
pub mod manifest;
pub mod registry;

pub use adapter::{ForeignAdapter, StringAdapter, VectorAdapter};
pub use declaration::{DeclarationId, DeclarationTarget};
pub use descriptor::{AdapterDescriptor, AdapterMetadata, ResolvedAdapter};
pub use manifest::GeneratorManifest;
pub use registry::BindingRegistry;
