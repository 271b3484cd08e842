//! Allocation settings shared by all views created through a runtime.

use peerview_common::{Result, verify_arg};

/// Default minimal alignment of every foreign block, in bytes.
pub const DEFAULT_MIN_ALIGNMENT: usize = 64;

/// Configuration for foreign allocations.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Minimal alignment of each block. The effective alignment is the larger of
    /// this value and the element alignment.
    pub min_alignment: usize,
    /// Whether freshly allocated memory is zero-initialized.
    pub zero_fill: bool,
    /// Upper bound for a single allocation, in bytes.
    pub max_allocation_bytes: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            min_alignment: DEFAULT_MIN_ALIGNMENT,
            zero_fill: true,
            max_allocation_bytes: isize::MAX as usize,
        }
    }
}

impl AllocatorConfig {
    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        verify_arg!(min_alignment, self.min_alignment.is_power_of_two());
        verify_arg!(
            max_allocation_bytes,
            self.max_allocation_bytes <= isize::MAX as usize
        );
        Ok(())
    }

    /// Returns the alignment used for a block holding elements with the given
    /// alignment.
    #[inline]
    pub fn alignment_for(&self, element_align: usize) -> usize {
        self.min_alignment.max(element_align)
    }
}
