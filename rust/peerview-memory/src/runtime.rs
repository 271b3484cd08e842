//! The foreign runtime: an allocator plus its configuration.
//!
//! A runtime may be passed explicitly to every allocating constructor, or
//! installed once per process with [`ForeignRuntime::load`] /
//! [`ForeignRuntime::install`]. Allocating through [`ForeignRuntime::global`]
//! before any runtime is installed fails with an allocation error.

use std::sync::{Arc, OnceLock};

use log::debug;
use peerview_common::{Result, error::Error};

use crate::{
    allocator::{ForeignAllocation, ForeignAllocator, SystemAllocator},
    config::AllocatorConfig,
    deallocator::Deallocator,
};

static GLOBAL_RUNTIME: OnceLock<ForeignRuntime> = OnceLock::new();

/// A cheaply cloneable handle to a foreign allocator and its configuration.
#[derive(Clone)]
pub struct ForeignRuntime {
    allocator: Arc<dyn ForeignAllocator>,
    config: AllocatorConfig,
}

impl ForeignRuntime {
    /// Creates a runtime over the given allocator.
    pub fn new(allocator: Arc<dyn ForeignAllocator>, config: AllocatorConfig) -> Result<ForeignRuntime> {
        config.validate()?;
        Ok(ForeignRuntime { allocator, config })
    }

    /// Creates a runtime backed by the global Rust allocator with default settings.
    pub fn system() -> ForeignRuntime {
        let config = AllocatorConfig::default();
        ForeignRuntime {
            allocator: Arc::new(SystemAllocator::new(config.zero_fill)),
            config,
        }
    }

    /// Installs the system runtime as the process-wide runtime, unless another
    /// runtime has been installed already, and returns the installed runtime.
    ///
    /// Calling `load` more than once is harmless.
    pub fn load() -> &'static ForeignRuntime {
        GLOBAL_RUNTIME.get_or_init(|| {
            debug!("loading system foreign runtime");
            ForeignRuntime::system()
        })
    }

    /// Installs `runtime` as the process-wide runtime.
    ///
    /// Fails if a runtime has already been installed.
    pub fn install(runtime: ForeignRuntime) -> Result<&'static ForeignRuntime> {
        GLOBAL_RUNTIME
            .set(runtime)
            .map_err(|_| Error::invalid_arg("runtime", "a foreign runtime is already installed"))?;
        debug!("installed custom foreign runtime");
        ForeignRuntime::global()
    }

    /// Returns the process-wide runtime.
    pub fn global() -> Result<&'static ForeignRuntime> {
        GLOBAL_RUNTIME.get().ok_or_else(Error::runtime_not_loaded)
    }

    /// Returns `true` once a process-wide runtime has been installed.
    pub fn is_loaded() -> bool {
        GLOBAL_RUNTIME.get().is_some()
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn allocator(&self) -> &Arc<dyn ForeignAllocator> {
        &self.allocator
    }

    /// Requests a block of `byte_size` bytes suitable for elements with the
    /// given alignment.
    pub fn allocate_block(&self, byte_size: usize, element_align: usize) -> Result<ForeignAllocation> {
        if byte_size > self.config.max_allocation_bytes {
            return Err(Error::allocation(
                byte_size,
                format!(
                    "request exceeds the configured maximum of {} bytes",
                    self.config.max_allocation_bytes
                ),
            ));
        }
        let alignment = self.config.alignment_for(element_align);
        let ptr = self.allocator.allocate(byte_size, alignment)?;
        if self.config.zero_fill && !self.allocator.zero_fills() && byte_size != 0 {
            unsafe { ptr.as_ptr().write_bytes(0, byte_size) };
        }
        Ok(ForeignAllocation {
            ptr,
            byte_size,
            alignment,
        })
    }

    /// Builds the hook that returns `allocation` to this runtime's allocator.
    pub fn deallocator_for(&self, allocation: ForeignAllocation) -> Deallocator {
        Deallocator::for_allocation(self.allocator.clone(), allocation)
    }
}

impl std::fmt::Debug for ForeignRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignRuntime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
