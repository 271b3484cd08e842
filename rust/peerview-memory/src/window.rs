//! Borrowed, window-respecting element views.

use std::ops::Deref;

/// The `[position, limit)` window of a typed accessor, viewed in place.
///
/// The window borrows the accessor, so the underlying block cannot be released
/// or written while the window is alive.
pub struct ElementWindow<'a, T> {
    elements: &'a [T],
    start: usize,
}

impl<'a, T> ElementWindow<'a, T> {
    pub(crate) fn new(elements: &'a [T], start: usize) -> ElementWindow<'a, T> {
        ElementWindow { elements, start }
    }

    /// Absolute index of the first element of the window.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Absolute index one past the last element of the window.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.elements.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'a, T> {
        self.elements.iter()
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.elements.to_vec()
    }
}

impl<T> Clone for ElementWindow<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ElementWindow<'_, T> {}

impl<T> Deref for ElementWindow<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.elements
    }
}

impl<T> AsRef<[T]> for ElementWindow<'_, T> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.elements
    }
}

impl<'a, T> IntoIterator for ElementWindow<'a, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<'a, T> IntoIterator for &ElementWindow<'a, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ElementWindow<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementWindow")
            .field("start", &self.start)
            .field("elements", &self.elements)
            .finish()
    }
}
