//! The foreign allocator seam.
//!
//! Views never talk to the host allocator directly: every block is requested
//! through a [`ForeignAllocator`], which exposes exactly two primitives, one to
//! obtain a block and one to give it back.

use std::{
    alloc::Layout,
    ptr::NonNull,
    sync::atomic::{AtomicU64, Ordering},
};

use peerview_common::{Result, error::Error, verify_arg};

/// A source of contiguous foreign memory blocks.
///
/// # Safety contract for implementors
///
/// A pointer returned by `allocate(byte_size, alignment)` must be aligned to
/// `alignment`, valid for reads and writes of `byte_size` bytes, and remain valid
/// until it is passed to `deallocate` with the same size and alignment.
pub trait ForeignAllocator: Send + Sync {
    /// Requests a block of `byte_size` bytes aligned to `alignment`.
    ///
    /// `alignment` is always a power of two. A zero-sized request must still
    /// return a non-null, suitably aligned pointer.
    fn allocate(&self, byte_size: usize, alignment: usize) -> Result<NonNull<u8>>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator with the same
    /// `byte_size` and `alignment`, and must not have been deallocated already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, byte_size: usize, alignment: usize);

    /// Whether blocks are zero-initialized on allocation.
    fn zero_fills(&self) -> bool {
        false
    }
}

/// Describes a block handed out by a [`ForeignAllocator`].
#[derive(Debug, Clone, Copy)]
pub struct ForeignAllocation {
    /// Start of the block.
    pub ptr: NonNull<u8>,
    /// Size of the block in bytes, as requested.
    pub byte_size: usize,
    /// Alignment the block was requested with.
    pub alignment: usize,
}

// SAFETY: `ForeignAllocation` is a plain description of a block; it does not
// dereference the pointer.
unsafe impl Send for ForeignAllocation {}
unsafe impl Sync for ForeignAllocation {}

impl ForeignAllocation {
    /// Returns the block to `allocator`.
    ///
    /// # Safety
    ///
    /// The block must have been obtained from `allocator` and must not be used
    /// or freed afterwards.
    pub unsafe fn free_with(self, allocator: &dyn ForeignAllocator) {
        unsafe { allocator.deallocate(self.ptr, self.byte_size, self.alignment) }
    }
}

/// The default foreign allocator, backed by the global Rust allocator.
#[derive(Debug, Clone, Copy)]
pub struct SystemAllocator {
    zero_fill: bool,
}

impl SystemAllocator {
    pub fn new(zero_fill: bool) -> SystemAllocator {
        SystemAllocator { zero_fill }
    }
}

impl Default for SystemAllocator {
    fn default() -> Self {
        SystemAllocator::new(true)
    }
}

impl ForeignAllocator for SystemAllocator {
    fn allocate(&self, byte_size: usize, alignment: usize) -> Result<NonNull<u8>> {
        verify_arg!(alignment, alignment.is_power_of_two());
        if byte_size == 0 {
            return Ok(dangling(alignment));
        }
        let layout = Layout::from_size_align(byte_size, alignment)
            .map_err(|e| Error::allocation(byte_size, e.to_string()))?;
        let ptr = unsafe {
            if self.zero_fill {
                std::alloc::alloc_zeroed(layout)
            } else {
                std::alloc::alloc(layout)
            }
        };
        NonNull::new(ptr).ok_or_else(|| Error::allocation(byte_size, "out of memory"))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, byte_size: usize, alignment: usize) {
        if byte_size == 0 {
            return;
        }
        unsafe {
            let layout = Layout::from_size_align_unchecked(byte_size, alignment);
            std::alloc::dealloc(ptr.as_ptr(), layout);
        }
    }

    fn zero_fills(&self) -> bool {
        self.zero_fill
    }
}

/// An aligned, non-null address that may be used for zero-sized blocks.
#[inline]
fn dangling(alignment: usize) -> NonNull<u8> {
    // `alignment` is a nonzero power of two.
    NonNull::new(std::ptr::without_provenance_mut(alignment)).unwrap_or(NonNull::dangling())
}

/// Snapshot of the counters kept by a [`TrackingAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Number of successful `allocate` calls.
    pub allocations: u64,
    /// Number of `deallocate` calls.
    pub deallocations: u64,
    /// Bytes currently handed out and not yet returned.
    pub live_bytes: u64,
}

impl AllocationStats {
    /// Number of blocks handed out and not yet returned.
    pub fn live_blocks(&self) -> u64 {
        self.allocations - self.deallocations
    }
}

/// Wraps another allocator, counting allocations and enforcing an optional
/// byte budget.
///
/// Requests that would push the live byte count over the budget fail with an
/// allocation error without reaching the inner allocator.
pub struct TrackingAllocator<A> {
    inner: A,
    budget: Option<u64>,
    allocations: AtomicU64,
    deallocations: AtomicU64,
    live_bytes: AtomicU64,
}

impl<A: ForeignAllocator> TrackingAllocator<A> {
    pub fn new(inner: A) -> TrackingAllocator<A> {
        TrackingAllocator {
            inner,
            budget: None,
            allocations: AtomicU64::new(0),
            deallocations: AtomicU64::new(0),
            live_bytes: AtomicU64::new(0),
        }
    }

    /// Limits the number of live bytes to `budget`.
    pub fn with_budget(mut self, budget: u64) -> TrackingAllocator<A> {
        self.budget = Some(budget);
        self
    }

    /// Returns the current counters.
    ///
    /// The values may be outdated if other threads allocate concurrently.
    pub fn stats(&self) -> AllocationStats {
        AllocationStats {
            allocations: self.allocations.load(Ordering::Acquire),
            deallocations: self.deallocations.load(Ordering::Acquire),
            live_bytes: self.live_bytes.load(Ordering::Acquire),
        }
    }

    fn reserve(&self, amount: u64) -> bool {
        let Some(budget) = self.budget else {
            self.live_bytes.fetch_add(amount, Ordering::AcqRel);
            return true;
        };
        let mut current = self.live_bytes.load(Ordering::Relaxed);
        loop {
            let Some(next) = current.checked_add(amount).filter(|&n| n <= budget) else {
                return false;
            };
            match self.live_bytes.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(updated) => current = updated,
            }
        }
    }
}

impl<A: ForeignAllocator> ForeignAllocator for TrackingAllocator<A> {
    fn allocate(&self, byte_size: usize, alignment: usize) -> Result<NonNull<u8>> {
        if !self.reserve(byte_size as u64) {
            return Err(Error::allocation(byte_size, "allocation budget exceeded"));
        }
        match self.inner.allocate(byte_size, alignment) {
            Ok(ptr) => {
                self.allocations.fetch_add(1, Ordering::AcqRel);
                Ok(ptr)
            }
            Err(e) => {
                self.live_bytes.fetch_sub(byte_size as u64, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, byte_size: usize, alignment: usize) {
        unsafe { self.inner.deallocate(ptr, byte_size, alignment) };
        self.deallocations.fetch_add(1, Ordering::AcqRel);
        self.live_bytes.fetch_sub(byte_size as u64, Ordering::AcqRel);
    }

    fn zero_fills(&self) -> bool {
        self.inner.zero_fills()
    }
}
