//! cuSOLVER sparse handle and cuSPARSE matrix descriptor.
//!
//! The sparse Cholesky solver needs a cuSOLVER sparse handle bound to the
//! context's stream and a general, zero-based cuSPARSE matrix descriptor.
//! cudarc exposes neither through its safe API, so both are created and
//! destroyed through the raw bindings here.

use crate::context::CudaContext;
use crate::error::{CudaError, Result};
use cudarc::cusolver::sys as cusolver_sys;
use cudarc::cusparse::sys as cusparse_sys;
use std::mem::MaybeUninit;
use std::sync::Arc;

/// cuSOLVER sparse handle plus the CSR descriptor passed to every solve.
pub struct CudaSparseContext {
    cuda_ctx: Arc<CudaContext>,
    cusolver_sp_handle: cusolver_sys::cusolverSpHandle_t,
    descr: cusparse_sys::cusparseMatDescr_t,
}

// SAFETY: the handle and descriptor are owned exclusively by this value and
// destroyed in Drop. Moving them to another thread is allowed by cuSOLVER as
// long as calls are not made concurrently, which `&mut` access on the
// backend guarantees.
unsafe impl Send for CudaSparseContext {}

impl CudaSparseContext {
    /// Create a new sparse context from an existing CUDA context.
    pub fn new(cuda_ctx: Arc<CudaContext>) -> Result<Self> {
        let cusolver_sp_handle = create_cusolver_sp_handle()
            .map_err(|e| CudaError::DeviceInit(format!("cuSOLVER sparse init failed: {}", e)))?;

        let status = unsafe {
            cusolver_sys::cusolverSpSetStream(
                cusolver_sp_handle,
                cuda_ctx.stream.cu_stream() as cusolver_sys::cudaStream_t,
            )
        };
        if status != cusolver_sys::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
            unsafe {
                let _ = destroy_cusolver_sp_handle(cusolver_sp_handle);
            }
            return Err(CudaError::DeviceInit(format!(
                "cusolverSpSetStream failed: {:?}",
                status
            )));
        }

        let descr = match create_general_descr() {
            Ok(descr) => descr,
            Err(e) => {
                unsafe {
                    let _ = destroy_cusolver_sp_handle(cusolver_sp_handle);
                }
                return Err(CudaError::Cusparse(e));
            }
        };

        log::info!(
            "CUDA sparse context initialized on device {}",
            cuda_ctx.device_id()
        );

        Ok(Self {
            cuda_ctx,
            cusolver_sp_handle,
            descr,
        })
    }

    pub fn cuda_context(&self) -> &Arc<CudaContext> {
        &self.cuda_ctx
    }

    pub fn cusolver_sp_handle(&self) -> cusolver_sys::cusolverSpHandle_t {
        self.cusolver_sp_handle
    }

    /// General matrix, zero-based indices.
    pub fn general_descr(&self) -> cusparse_sys::cusparseMatDescr_t {
        self.descr
    }
}

impl Drop for CudaSparseContext {
    fn drop(&mut self) {
        unsafe {
            let _ = cusparse_sys::cusparseDestroyMatDescr(self.descr);
        }
        unsafe {
            let _ = destroy_cusolver_sp_handle(self.cusolver_sp_handle);
        }
        log::debug!("CUDA sparse context released");
    }
}

fn create_cusolver_sp_handle() -> std::result::Result<cusolver_sys::cusolverSpHandle_t, String> {
    let mut handle = MaybeUninit::uninit();
    let status = unsafe { cusolver_sys::cusolverSpCreate(handle.as_mut_ptr()) };
    if status != cusolver_sys::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
        return Err(format!("cusolverSpCreate failed: {:?}", status));
    }
    Ok(unsafe { handle.assume_init() })
}

unsafe fn destroy_cusolver_sp_handle(
    handle: cusolver_sys::cusolverSpHandle_t,
) -> std::result::Result<(), String> {
    let status = unsafe { cusolver_sys::cusolverSpDestroy(handle) };
    if status != cusolver_sys::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
        return Err(format!("cusolverSpDestroy failed: {:?}", status));
    }
    Ok(())
}

fn create_general_descr() -> std::result::Result<cusparse_sys::cusparseMatDescr_t, String> {
    use cusparse_sys::cusparseStatus_t::CUSPARSE_STATUS_SUCCESS;

    let mut descr = MaybeUninit::uninit();
    let status = unsafe { cusparse_sys::cusparseCreateMatDescr(descr.as_mut_ptr()) };
    if status != CUSPARSE_STATUS_SUCCESS {
        return Err(format!("cusparseCreateMatDescr failed: {:?}", status));
    }
    let descr = unsafe { descr.assume_init() };

    let status = unsafe {
        cusparse_sys::cusparseSetMatType(
            descr,
            cusparse_sys::cusparseMatrixType_t::CUSPARSE_MATRIX_TYPE_GENERAL,
        )
    };
    let status = if status == CUSPARSE_STATUS_SUCCESS {
        unsafe {
            cusparse_sys::cusparseSetMatIndexBase(
                descr,
                cusparse_sys::cusparseIndexBase_t::CUSPARSE_INDEX_BASE_ZERO,
            )
        }
    } else {
        status
    };
    if status != CUSPARSE_STATUS_SUCCESS {
        unsafe {
            let _ = cusparse_sys::cusparseDestroyMatDescr(descr);
        }
        return Err(format!("cusparse descriptor setup failed: {:?}", status));
    }
    Ok(descr)
}
