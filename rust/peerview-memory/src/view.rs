//! `MemoryView`: an untyped handle to a contiguous block of foreign memory.
//!
//! A view tracks three element counts:
//!
//! - `capacity`: number of addressable elements starting at `address`,
//! - `limit`: end of the logical window, `limit <= capacity`,
//! - `position`: start of the logical window, `position <= limit`.
//!
//! The window only affects consumers that ask for it (see
//! [`TypedAccessor::as_view`](crate::accessor::TypedAccessor::as_view)); indexed
//! and bulk accessors address elements from index 0 regardless of the window.
//!
//! # Ownership
//!
//! A view created by allocation owns its block and carries a one-shot
//! [`Deallocator`], unless the allocation was made under
//! [`DeallocationPolicy::Suppress`]. A view created by reference never owns its
//! block. The hook runs exactly once, on the first [`MemoryView::release`] or when
//! the view is dropped.

use std::ptr::NonNull;

use log::{debug, trace, warn};
use peerview_common::{Result, error::Error, verify_arg, verify_bounds};

use crate::{deallocator::Deallocator, policy::DeallocationPolicy, runtime::ForeignRuntime};

/// Size and alignment of one logical element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    size: usize,
    align: usize,
}

impl ElementLayout {
    /// Creates a layout with the given element size and alignment.
    ///
    /// The size must be nonzero and the alignment a power of two.
    pub fn new(size: usize, align: usize) -> Result<ElementLayout> {
        verify_arg!(size, size != 0);
        verify_arg!(align, align.is_power_of_two());
        Ok(ElementLayout { size, align })
    }

    /// Layout of a single `T`.
    pub fn of<T>() -> Result<ElementLayout> {
        ElementLayout::new(std::mem::size_of::<T>(), std::mem::align_of::<T>())
    }

    /// Layout of raw bytes.
    pub fn bytes() -> ElementLayout {
        ElementLayout { size: 1, align: 1 }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }
}

/// A handle to foreign memory with a `[position, limit)` window.
pub struct MemoryView {
    /// Start of the block; `None` once released or for an empty reference.
    address: Option<NonNull<u8>>,
    layout: ElementLayout,
    capacity: usize,
    /// Largest capacity this view may be widened to.
    extent: usize,
    position: usize,
    limit: usize,
    deallocator: Option<Deallocator>,
}

impl MemoryView {
    /// Allocates `capacity` elements through the process-wide runtime.
    ///
    /// Fails with an allocation error if no runtime has been loaded.
    pub fn allocate(capacity: usize, layout: ElementLayout) -> Result<MemoryView> {
        MemoryView::allocate_in(ForeignRuntime::global()?, capacity, layout)
    }

    /// Allocates `capacity` elements through `runtime`, attaching a deallocator.
    pub fn allocate_in(
        runtime: &ForeignRuntime,
        capacity: usize,
        layout: ElementLayout,
    ) -> Result<MemoryView> {
        MemoryView::allocate_with_policy(runtime, capacity, layout, DeallocationPolicy::Attach)
    }

    /// Allocates `capacity` elements through `runtime`, consulting `policy` to
    /// decide whether the view owns the block.
    pub fn allocate_with_policy(
        runtime: &ForeignRuntime,
        capacity: usize,
        layout: ElementLayout,
        policy: DeallocationPolicy,
    ) -> Result<MemoryView> {
        let byte_size = capacity.checked_mul(layout.size).ok_or_else(|| {
            Error::allocation(
                usize::MAX,
                format!("{capacity} elements of {} bytes overflow", layout.size),
            )
        })?;
        let allocation = runtime.allocate_block(byte_size, layout.align)?;
        let deallocator = match policy {
            DeallocationPolicy::Attach => Some(runtime.deallocator_for(allocation)),
            DeallocationPolicy::Suppress => {
                warn!(
                    "allocated {byte_size} bytes at {:p} without a deallocator",
                    allocation.ptr
                );
                None
            }
        };
        debug!(
            "allocated view: {capacity} x {} bytes at {:p}, owned: {}",
            layout.size,
            allocation.ptr,
            deallocator.is_some()
        );
        Ok(MemoryView {
            address: Some(allocation.ptr),
            layout,
            capacity,
            extent: capacity,
            position: 0,
            limit: capacity,
            deallocator,
        })
    }

    /// Wraps existing memory without taking ownership of it.
    ///
    /// `address` may be null only when `capacity` is zero, and must be aligned to
    /// the element alignment.
    ///
    /// # Safety
    ///
    /// `address` must be valid for reads and writes of `capacity` elements of
    /// `layout` for as long as the view (or anything derived from it) is used,
    /// and must not be accessed through other references during that time.
    pub unsafe fn reference(
        address: *mut u8,
        capacity: usize,
        layout: ElementLayout,
    ) -> Result<MemoryView> {
        let address = NonNull::new(address);
        verify_arg!(address, address.is_some() || capacity == 0);
        if let Some(ptr) = address {
            verify_arg!(
                address,
                (ptr.as_ptr() as usize).is_multiple_of(layout.align)
            );
        }
        verify_arg!(capacity, capacity.checked_mul(layout.size).is_some());
        trace!("referenced view: {capacity} x {} bytes at {address:?}", layout.size);
        Ok(MemoryView {
            address,
            layout,
            capacity,
            extent: capacity,
            position: 0,
            limit: capacity,
            deallocator: None,
        })
    }

    /// Returns the start address, or null for a released or empty view.
    ///
    /// The address is opaque to the host: it is only meaningful to foreign code
    /// and to the accessors built on this view.
    #[inline]
    pub fn address(&self) -> *mut u8 {
        self.address
            .map_or(std::ptr::null_mut(), |ptr| ptr.as_ptr())
    }

    #[inline]
    pub fn layout(&self) -> ElementLayout {
        self.layout
    }

    /// Size of one element in bytes.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.layout.size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of elements in the window, `limit - position`.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// Addressable size in bytes.
    #[inline]
    pub fn byte_capacity(&self) -> usize {
        self.capacity * self.layout.size
    }

    /// Whether this view is credited with deallocating its block.
    #[inline]
    pub fn owns_deallocator(&self) -> bool {
        self.deallocator.is_some()
    }

    /// Whether the view has no addressable elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.capacity == 0
    }

    /// Moves the start of the window.
    ///
    /// Fails if `position > limit`.
    pub fn set_position(&mut self, position: usize) -> Result<&mut MemoryView> {
        verify_bounds!(position, position <= self.limit);
        self.position = position;
        Ok(self)
    }

    /// Moves the end of the window.
    ///
    /// Fails if `limit > capacity`. A limit below the current position pulls the
    /// position down to the new limit.
    pub fn set_limit(&mut self, limit: usize) -> Result<&mut MemoryView> {
        verify_bounds!(limit, limit <= self.capacity);
        self.limit = limit;
        self.position = self.position.min(limit);
        Ok(self)
    }

    /// Changes the number of addressable elements without allocating.
    ///
    /// Only views that do not own their block may be resized, and never beyond
    /// the extent they were created with. The limit and then the position are
    /// clamped to the new capacity.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<&mut MemoryView> {
        if self.owns_deallocator() {
            return Err(Error::bounds(
                "capacity",
                "the capacity of a view owning its memory is fixed",
            ));
        }
        verify_bounds!(capacity, capacity <= self.extent);
        self.capacity = capacity;
        self.limit = self.limit.min(capacity);
        self.position = self.position.min(self.limit);
        Ok(self)
    }

    /// Releases the block if this view owns it.
    ///
    /// The first call on an owning view runs the deallocation hook and empties
    /// the view. Further calls, and calls on non-owning views, do nothing.
    pub fn release(&mut self) {
        let Some(deallocator) = self.deallocator.take() else {
            return;
        };
        debug!(
            "releasing view: {} x {} bytes at {:p}",
            self.capacity,
            self.layout.size,
            self.address()
        );
        deallocator.run();
        self.address = None;
        self.capacity = 0;
        self.extent = 0;
        self.position = 0;
        self.limit = 0;
    }

    /// Registers `deallocator` as this view's hook, making the view the owner
    /// of its block.
    ///
    /// Fails if the view already owns a hook or has no address.
    pub fn attach_deallocator(&mut self, deallocator: Deallocator) -> Result<&mut MemoryView> {
        verify_arg!(deallocator, self.deallocator.is_none());
        verify_arg!(address, self.address.is_some());
        self.deallocator = Some(deallocator);
        Ok(self)
    }

    /// Takes the hook out of the view, transferring ownership of the block to
    /// the caller. The view keeps its address and window.
    pub fn detach_deallocator(&mut self) -> Option<Deallocator> {
        self.deallocator.take()
    }

    /// Reinterprets the view as elements of `layout`.
    ///
    /// Capacity, extent, position and limit are converted through their byte
    /// offsets, rounding down. Ownership moves with the view. Fails if the
    /// address is not aligned for `layout`, in which case the view is dropped.
    pub fn retype(mut self, layout: ElementLayout) -> Result<MemoryView> {
        if let Some(ptr) = self.address {
            verify_arg!(
                address,
                (ptr.as_ptr() as usize).is_multiple_of(layout.align)
            );
        }
        let old = self.layout.size;
        let convert = |count: usize| count * old / layout.size;
        let view = MemoryView {
            address: self.address,
            layout,
            capacity: convert(self.capacity),
            extent: convert(self.extent),
            position: convert(self.position),
            limit: convert(self.limit),
            deallocator: self.deallocator.take(),
        };
        trace!(
            "retyped view at {:p}: {} -> {} bytes per element",
            view.address(),
            old,
            layout.size
        );
        Ok(view)
    }

    /// Pointer to the first element, typed as `T`, or `None` for an empty view.
    #[inline]
    pub(crate) fn typed_ptr<T>(&self) -> Option<NonNull<T>> {
        self.address
            .filter(|_| self.capacity != 0)
            .map(|ptr| ptr.cast())
    }
}

impl Drop for MemoryView {
    fn drop(&mut self) {
        self.release();
    }
}

// SAFETY: a view is the only handle through which its block is mutated, and all
// mutation requires `&mut self`. The deallocation hook is `Send + Sync`.
unsafe impl Send for MemoryView {}

// SAFETY: shared access only reads metadata and element values.
unsafe impl Sync for MemoryView {}

impl std::fmt::Debug for MemoryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryView")
            .field("address", &self.address())
            .field("element_size", &self.layout.size)
            .field("capacity", &self.capacity)
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("owns_deallocator", &self.owns_deallocator())
            .finish()
    }
}
