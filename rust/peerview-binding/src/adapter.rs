//! The adapter contract and the two standard adapters.
//!
//! An adapter sits between a host value and a foreign container at a call
//! site. Whatever its foreign type, it must be constructible from a
//! pointer/size pair and from the host value, convertible back to the host
//! value, re-assignable from a pointer/size pair, report its size, and provide a
//! static way to free containers it handed out.

use bytemuck::Pod;
use peerview_common::Result;
use peerview_memory::{ElementWindow, ForeignRuntime, TypedAccessor};

/// The contract every adapter satisfies.
pub trait ForeignAdapter: Sized {
    /// The host-side value the adapter converts from and to.
    type Host;
    /// The element type of the foreign container.
    type Element: Pod;

    /// Builds the adapter from `size` elements at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `size` elements, or `size` must be 0.
    unsafe fn from_raw_parts(ptr: *const Self::Element, size: usize) -> Self;

    /// Builds the adapter from a host value.
    fn from_host(host: &Self::Host) -> Self;

    /// Replaces the contents with `size` elements at `ptr`.
    ///
    /// # Safety
    ///
    /// Same requirements as [`ForeignAdapter::from_raw_parts`].
    unsafe fn assign(&mut self, ptr: *const Self::Element, size: usize);

    /// Number of elements held.
    fn size(&self) -> usize;

    /// Pointer to the first element.
    fn as_ptr(&self) -> *const Self::Element;

    /// Converts back to the host value.
    fn to_host(&self) -> Self::Host;

    /// Hands the contents out as a foreign-owned `(pointer, size)` pair, to be
    /// freed with [`ForeignAdapter::deallocate`].
    fn into_raw_parts(self) -> (*mut Self::Element, usize);

    /// Frees a pair returned by [`ForeignAdapter::into_raw_parts`].
    ///
    /// # Safety
    ///
    /// `ptr` and `size` must come from `into_raw_parts` of the same adapter type
    /// and must not be used afterwards.
    unsafe fn deallocate(ptr: *mut Self::Element, size: usize);
}

/// Bridges a host `Vec<T>` and a contiguous foreign array of `T`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorAdapter<T> {
    data: Vec<T>,
}

impl<T: Pod> VectorAdapter<T> {
    /// Copies the window of a typed accessor.
    pub fn from_window(window: ElementWindow<'_, T>) -> VectorAdapter<T> {
        VectorAdapter {
            data: window.to_vec(),
        }
    }

    /// Copies the `[position, limit)` window of `accessor`.
    pub fn from_accessor(accessor: &TypedAccessor<T>) -> VectorAdapter<T> {
        VectorAdapter::from_window(accessor.as_view())
    }

    /// Moves the contents into freshly allocated foreign memory.
    pub fn into_accessor(self, runtime: &ForeignRuntime) -> Result<TypedAccessor<T>> {
        TypedAccessor::from_slice(runtime, &self.data)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Pod> ForeignAdapter for VectorAdapter<T> {
    type Host = Vec<T>;
    type Element = T;

    unsafe fn from_raw_parts(ptr: *const T, size: usize) -> Self {
        let mut adapter = VectorAdapter { data: Vec::new() };
        unsafe { adapter.assign(ptr, size) };
        adapter
    }

    fn from_host(host: &Vec<T>) -> Self {
        VectorAdapter { data: host.clone() }
    }

    unsafe fn assign(&mut self, ptr: *const T, size: usize) {
        self.data.clear();
        if size != 0 {
            self.data
                .extend_from_slice(unsafe { std::slice::from_raw_parts(ptr, size) });
        }
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    fn to_host(&self) -> Vec<T> {
        self.data.clone()
    }

    fn into_raw_parts(self) -> (*mut T, usize) {
        let boxed = self.data.into_boxed_slice();
        let size = boxed.len();
        (Box::into_raw(boxed).cast::<T>(), size)
    }

    unsafe fn deallocate(ptr: *mut T, size: usize) {
        drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, size)) });
    }
}

/// Bridges a host `String` and a foreign byte string.
///
/// Foreign bytes that are not valid UTF-8 are replaced when converting back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringAdapter {
    bytes: Vec<u8>,
}

impl StringAdapter {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ForeignAdapter for StringAdapter {
    type Host = String;
    type Element = u8;

    unsafe fn from_raw_parts(ptr: *const u8, size: usize) -> Self {
        let mut adapter = StringAdapter::default();
        unsafe { adapter.assign(ptr, size) };
        adapter
    }

    fn from_host(host: &String) -> Self {
        StringAdapter {
            bytes: host.as_bytes().to_vec(),
        }
    }

    unsafe fn assign(&mut self, ptr: *const u8, size: usize) {
        self.bytes.clear();
        if size != 0 {
            self.bytes
                .extend_from_slice(unsafe { std::slice::from_raw_parts(ptr, size) });
        }
    }

    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    fn to_host(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    fn into_raw_parts(self) -> (*mut u8, usize) {
        let boxed = self.bytes.into_boxed_slice();
        let size = boxed.len();
        (Box::into_raw(boxed).cast::<u8>(), size)
    }

    unsafe fn deallocate(ptr: *mut u8, size: usize) {
        drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, size)) });
    }
}
