//! One-shot deallocation hooks.

use std::sync::Arc;

use crate::allocator::{ForeignAllocation, ForeignAllocator};

/// A deallocation hook attached to a [`MemoryView`](crate::view::MemoryView).
///
/// The hook is consumed when it runs, so it can be invoked at most once. A view
/// holding a hook is the unique owner of its block; handing the hook over via
/// [`MemoryView::detach_deallocator`](crate::view::MemoryView::detach_deallocator)
/// transfers that ownership.
pub struct Deallocator(Box<dyn FnOnce() + Send + Sync>);

impl Deallocator {
    /// Creates a hook from an arbitrary closure.
    pub fn new<F>(f: F) -> Deallocator
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Deallocator(Box::new(f))
    }

    /// Creates a hook returning `allocation` to `allocator`.
    pub(crate) fn for_allocation(
        allocator: Arc<dyn ForeignAllocator>,
        allocation: ForeignAllocation,
    ) -> Deallocator {
        Deallocator::new(move || unsafe { allocation.free_with(allocator.as_ref()) })
    }

    /// Runs the hook.
    pub fn run(self) {
        (self.0)()
    }
}

impl std::fmt::Debug for Deallocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Deallocator")
    }
}
