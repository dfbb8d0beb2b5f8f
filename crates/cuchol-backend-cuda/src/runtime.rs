//! Process-wide CUDA device context.
//!
//! The device context is created once by [`init`] and released by
//! [`shutdown`]. Backends take a shared reference through [`get`]; each
//! backend still owns its own cuSOLVER handle. Nothing here creates the
//! context as a side effect of a solve.

use std::sync::Arc;

use cuchol_solver::{Error, ProcessContext, Result};

use crate::context::CudaContext;

static DEVICE: ProcessContext<CudaContext> = ProcessContext::new("CUDA device context");

/// Initialize the device context on `device_id`.
///
/// # Errors
///
/// Returns [`Error::Context`] if already initialized and
/// [`Error::Unavailable`] if there is no such device.
pub fn init(device_id: usize) -> Result<Arc<CudaContext>> {
    DEVICE.init_with(|| Ok(CudaContext::with_device(device_id)?))
}

/// The initialized device context.
pub fn get() -> Result<Arc<CudaContext>> {
    DEVICE.get()
}

/// The device context, initializing it on `device_id` if needed.
///
/// # Errors
///
/// Returns [`Error::Context`] if the context exists on another device.
pub fn get_or_init(device_id: usize) -> Result<Arc<CudaContext>> {
    let ctx = DEVICE.get_or_init_with(|| Ok(CudaContext::with_device(device_id)?))?;
    if ctx.device_id() != device_id {
        return Err(Error::Context(format!(
            "device context is on device {}, requested {}",
            ctx.device_id(),
            device_id
        )));
    }
    Ok(ctx)
}

pub fn is_initialized() -> bool {
    DEVICE.is_initialized()
}

/// Drop the process's reference to the device context.
pub fn shutdown() -> bool {
    DEVICE.shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CudaCholeskyBackend, CudaConfig};

    #[test]
    fn test_backend_requires_explicit_init() {
        assert!(!is_initialized());
        assert!(matches!(get(), Err(Error::Context(_))));
        assert!(matches!(
            CudaCholeskyBackend::from_runtime(CudaConfig::default()),
            Err(Error::Context(_))
        ));
        assert!(!is_initialized());
    }
}
