//! Typed, bounds-aware views over foreign memory.
//!
//! A [`MemoryView`](view::MemoryView) is a handle to a contiguous block of memory
//! obtained from a [`ForeignAllocator`](allocator::ForeignAllocator) (or supplied
//! by the caller), with a logical `[position, limit)` window that is independent
//! of its `capacity`. A [`TypedAccessor`](accessor::TypedAccessor) layers element
//! level get/put on top of it.
//!
//! # Modules
//!
//! - [`allocator`]: the foreign allocator seam and the default system allocator
//! - [`config`]: allocation settings
//! - [`runtime`]: the process-wide foreign runtime handle
//! - [`policy`]: deallocation policy applied at allocation time
//! - [`deallocator`]: one-shot deallocation hooks
//! - [`view`]: the untyped `MemoryView`
//! - [`accessor`]: typed element access over a view
//! - [`window`]: borrowed window views produced by `as_view()`

pub mod accessor;
pub mod allocator;
pub mod config;
pub mod deallocator;
pub mod policy;
pub mod runtime;
pub mod view;
pub mod window;

pub use accessor::{FloatAccessor, HostBuffer, TypedAccessor};
pub use allocator::{
    AllocationStats, ForeignAllocation, ForeignAllocator, SystemAllocator, TrackingAllocator,
};
pub use config::AllocatorConfig;
pub use deallocator::Deallocator;
pub use policy::DeallocationPolicy;
pub use runtime::ForeignRuntime;
pub use view::{ElementLayout, MemoryView};
pub use window::ElementWindow;

#[cfg(test)]
mod tests;
