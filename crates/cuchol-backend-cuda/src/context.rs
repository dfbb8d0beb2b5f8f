//! CUDA device context management.

use crate::error::{CudaError, Result};
use cudarc::driver::{CudaContext as CudarCudaContext, CudaStream};
use std::sync::Arc;

/// CUDA context holding the device and its default stream.
///
/// Create one per process (see [`runtime`](crate::runtime)) and share it
/// between backends; sparse library handles live in
/// [`CudaSparseContext`](crate::CudaSparseContext).
pub struct CudaContext {
    pub(crate) ctx: Arc<CudarCudaContext>,
    pub(crate) stream: Arc<CudaStream>,
    device_id: usize,
}

impl CudaContext {
    /// Create a new CUDA context using device 0.
    ///
    /// # Errors
    ///
    /// Returns `CudaError::NoDevice` if no CUDA device is available.
    /// Returns `CudaError::DeviceInit` if device initialization fails.
    pub fn new() -> Result<Self> {
        Self::with_device(0)
    }

    /// Create a new CUDA context using a specific device.
    pub fn with_device(device_id: usize) -> Result<Self> {
        let ctx = CudarCudaContext::new(device_id).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("no CUDA-capable device")
                || msg.contains("invalid device")
                || msg.contains("ordinal")
            {
                CudaError::NoDevice
            } else {
                CudaError::DeviceInit(msg)
            }
        })?;

        let stream = ctx.default_stream();

        log::info!("CUDA context initialized on device {}", device_id);

        Ok(Self {
            ctx,
            stream,
            device_id,
        })
    }

    /// Check if CUDA is available on this system.
    pub fn is_available() -> bool {
        CudarCudaContext::new(0).is_ok()
    }

    pub fn device_id(&self) -> usize {
        self.device_id
    }

    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    pub fn cuda_context(&self) -> &Arc<CudarCudaContext> {
        &self.ctx
    }

    /// Block until all work queued on the default stream has finished.
    pub fn synchronize(&self) -> Result<()> {
        self.stream
            .synchronize()
            .map_err(|e| CudaError::Transfer(format!("sync failed: {}", e)))
    }
}
