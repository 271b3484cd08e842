//! Typed element access over a [`MemoryView`].
//!
//! A [`TypedAccessor<T>`] is a lens over one view: it owns the view (and with it
//! the deallocation hook, if any) and reads and writes elements of `T`.
//!
//! Index rules:
//!
//! - single-element `get_at`/`put_at` address `[0, capacity)` and ignore the
//!   window,
//! - bulk `get_slice*`/`put_slice*` copy from absolute index 0 and ignore the
//!   window as well,
//! - only [`TypedAccessor::as_view`] honors `[position, limit)`.
//!
//! Every operation checks its bounds before touching memory, so a failed call
//! never leaves a partial write behind.

use std::marker::PhantomData;

use bytemuck::Pod;
use peerview_common::{Result, error::Error, verify_bounds};

use crate::{
    policy::DeallocationPolicy,
    runtime::ForeignRuntime,
    view::{ElementLayout, MemoryView},
    window::ElementWindow,
};

/// The `f32` specialization.
pub type FloatAccessor = TypedAccessor<f32>;

/// A [`MemoryView`] read and written as elements of `T`.
pub struct TypedAccessor<T> {
    view: MemoryView,
    _marker: PhantomData<T>,
}

impl<T: Pod> TypedAccessor<T> {
    /// Allocates `capacity` elements through the process-wide runtime.
    pub fn allocate(capacity: usize) -> Result<TypedAccessor<T>> {
        TypedAccessor::allocate_in(ForeignRuntime::global()?, capacity)
    }

    /// Allocates `capacity` elements through `runtime`.
    pub fn allocate_in(runtime: &ForeignRuntime, capacity: usize) -> Result<TypedAccessor<T>> {
        TypedAccessor::allocate_with_policy(runtime, capacity, DeallocationPolicy::Attach)
    }

    /// Allocates `capacity` elements through `runtime` under `policy`.
    pub fn allocate_with_policy(
        runtime: &ForeignRuntime,
        capacity: usize,
        policy: DeallocationPolicy,
    ) -> Result<TypedAccessor<T>> {
        let view =
            MemoryView::allocate_with_policy(runtime, capacity, Self::layout()?, policy)?;
        Ok(TypedAccessor::wrap(view))
    }

    /// Allocates exactly `values.len()` elements and copies `values` into them.
    pub fn from_slice(runtime: &ForeignRuntime, values: &[T]) -> Result<TypedAccessor<T>> {
        let mut accessor = TypedAccessor::allocate_in(runtime, values.len())?;
        accessor.put_slice(values)?;
        Ok(accessor)
    }

    /// Copies a host buffer into fresh foreign memory, replicating its window.
    pub fn from_host_buffer(
        runtime: &ForeignRuntime,
        buffer: &HostBuffer<T>,
    ) -> Result<TypedAccessor<T>> {
        let mut accessor = TypedAccessor::from_slice(runtime, buffer.as_slice())?;
        accessor
            .set_limit(buffer.limit())?
            .set_position(buffer.position())?;
        Ok(accessor)
    }

    /// Wraps `capacity` elements at `ptr` without taking ownership.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `capacity` elements for as long
    /// as the accessor is used, and must not be accessed through other
    /// references during that time. See [`MemoryView::reference`].
    pub unsafe fn reference(ptr: *mut T, capacity: usize) -> Result<TypedAccessor<T>> {
        let view = unsafe { MemoryView::reference(ptr.cast(), capacity, Self::layout()?)? };
        Ok(TypedAccessor::wrap(view))
    }

    /// Reinterprets an untyped view as elements of `T`.
    pub fn retype(view: MemoryView) -> Result<TypedAccessor<T>> {
        let layout = Self::layout()?;
        let view = if view.layout() == layout {
            view
        } else {
            view.retype(layout)?
        };
        Ok(TypedAccessor::wrap(view))
    }

    fn wrap(view: MemoryView) -> TypedAccessor<T> {
        TypedAccessor {
            view,
            _marker: PhantomData,
        }
    }

    fn layout() -> Result<ElementLayout> {
        ElementLayout::of::<T>()
    }

    /// The underlying untyped view.
    #[inline]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    /// Unwraps the underlying untyped view, keeping its ownership.
    pub fn into_view(self) -> MemoryView {
        self.view
    }

    #[inline]
    pub fn address(&self) -> *mut T {
        self.view.address().cast()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.view.capacity()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.view.position()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.view.limit()
    }

    #[inline]
    pub fn owns_deallocator(&self) -> bool {
        self.view.owns_deallocator()
    }

    /// See [`MemoryView::set_position`].
    pub fn set_position(&mut self, position: usize) -> Result<&mut TypedAccessor<T>> {
        self.view.set_position(position)?;
        Ok(self)
    }

    /// See [`MemoryView::set_limit`].
    pub fn set_limit(&mut self, limit: usize) -> Result<&mut TypedAccessor<T>> {
        self.view.set_limit(limit)?;
        Ok(self)
    }

    /// See [`MemoryView::set_capacity`].
    pub fn set_capacity(&mut self, capacity: usize) -> Result<&mut TypedAccessor<T>> {
        self.view.set_capacity(capacity)?;
        Ok(self)
    }

    /// See [`MemoryView::release`].
    pub fn release(&mut self) {
        self.view.release();
    }

    /// Returns `get_at(0)`.
    pub fn get(&self) -> Result<T> {
        self.get_at(0)
    }

    /// Reads the element at absolute index `index`.
    ///
    /// Fails if `index >= capacity`.
    pub fn get_at(&self, index: usize) -> Result<T> {
        let elements = self.elements();
        verify_bounds!(index, index < elements.len());
        Ok(elements[index])
    }

    /// Returns `put_at(0, value)`.
    pub fn put(&mut self, value: T) -> Result<&mut TypedAccessor<T>> {
        self.put_at(0, value)
    }

    /// Writes `value` at absolute index `index`.
    ///
    /// Fails if `index >= capacity`.
    pub fn put_at(&mut self, index: usize, value: T) -> Result<&mut TypedAccessor<T>> {
        let elements = self.elements_mut();
        verify_bounds!(index, index < elements.len());
        elements[index] = value;
        Ok(self)
    }

    /// Returns `get_slice_range(dest, 0, dest.len())`.
    pub fn get_slice(&self, dest: &mut [T]) -> Result<&TypedAccessor<T>> {
        self.get_slice_range(dest, 0, dest.len())
    }

    /// Copies the first `length` elements into `dest[offset..offset + length]`.
    pub fn get_slice_range(
        &self,
        dest: &mut [T],
        offset: usize,
        length: usize,
    ) -> Result<&TypedAccessor<T>> {
        let range = bulk_range(dest.len(), offset, length, self.capacity())?;
        dest[range].copy_from_slice(&self.elements()[..length]);
        Ok(self)
    }

    /// Returns `put_slice_range(src, 0, src.len())`.
    pub fn put_slice(&mut self, src: &[T]) -> Result<&mut TypedAccessor<T>> {
        self.put_slice_range(src, 0, src.len())
    }

    /// Copies `src[offset..offset + length]` into the first `length` elements.
    pub fn put_slice_range(
        &mut self,
        src: &[T],
        offset: usize,
        length: usize,
    ) -> Result<&mut TypedAccessor<T>> {
        let src = &src[bulk_range(src.len(), offset, length, self.capacity())?];
        self.elements_mut()[..length].copy_from_slice(src);
        Ok(self)
    }

    /// Returns the `[position, limit)` window, sharing the underlying memory.
    pub fn as_view(&self) -> ElementWindow<'_, T> {
        let (position, limit) = (self.position(), self.limit());
        ElementWindow::new(&self.elements()[position..limit], position)
    }

    /// Copies all `capacity` elements into a host vector.
    pub fn to_vec(&self) -> Vec<T> {
        self.elements().to_vec()
    }

    fn elements(&self) -> &[T] {
        match self.view.typed_ptr::<T>() {
            // SAFETY: the view's address is aligned for `T` and valid for
            // `capacity` elements while the view is alive.
            Some(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.capacity()) },
            None => &[],
        }
    }

    fn elements_mut(&mut self) -> &mut [T] {
        match self.view.typed_ptr::<T>() {
            // SAFETY: as in `elements`; `&mut self` guarantees exclusive access.
            Some(ptr) => unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr(), self.capacity())
            },
            None => &mut [],
        }
    }
}

/// Validates a bulk transfer of `length` elements at `offset` in a host slice
/// of `host_len` elements against a view of `capacity` elements.
fn bulk_range(
    host_len: usize,
    offset: usize,
    length: usize,
    capacity: usize,
) -> Result<std::ops::Range<usize>> {
    let end = offset
        .checked_add(length)
        .ok_or_else(|| Error::bounds("offset", "offset + length overflows"))?;
    verify_bounds!(offset, end <= host_len);
    verify_bounds!(length, length <= capacity);
    Ok(offset..end)
}

impl<T> std::fmt::Debug for TypedAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedAccessor")
            .field("element", &std::any::type_name::<T>())
            .field("view", &self.view)
            .finish()
    }
}

/// A host-managed buffer with its own `[position, limit)` window.
///
/// Used as a source for [`TypedAccessor::from_host_buffer`].
#[derive(Debug, Clone, PartialEq)]
pub struct HostBuffer<T> {
    data: Vec<T>,
    position: usize,
    limit: usize,
}

impl<T> HostBuffer<T> {
    /// Wraps `data` with a window covering all of it.
    pub fn new(data: Vec<T>) -> HostBuffer<T> {
        let limit = data.len();
        HostBuffer {
            data,
            position: 0,
            limit,
        }
    }

    /// Sets the window to `[position, limit)`.
    pub fn with_window(mut self, position: usize, limit: usize) -> Result<HostBuffer<T>> {
        verify_bounds!(limit, limit <= self.data.len());
        verify_bounds!(position, position <= limit);
        self.position = position;
        self.limit = limit;
        Ok(self)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn into_inner(self) -> Vec<T> {
        self.data
    }
}

impl<T> From<Vec<T>> for HostBuffer<T> {
    fn from(data: Vec<T>) -> Self {
        HostBuffer::new(data)
    }
}
