//! cuSOLVER sparse Cholesky backend.
//!
//! Factorization and the triangular solves run in one
//! `cusolverSpDcsrlsvchol` call. `analyze` only checks that the matrix fits
//! the 32-bit index range and records its shape, and `factorize` hands out
//! a token tied to that shape. Breakdown of the factorization is therefore
//! reported by `solve`, as
//! [`BackendStatus::NotPositiveDefinite`](cuchol_solver::BackendStatus).
//!
//! The library's own reordering is switched off: ordering is done by the
//! session on the host.

use std::sync::Arc;

use cuchol_core::CsrMatrix;
use cuchol_solver::{
    BackendStatus, DeviceMatrix, DeviceTransfer, DeviceVector, Error as SolverError,
    Result as SolverResult, SparseSolverBackend,
};
use cudarc::cusolver::sys as cusolver_sys;
use cudarc::driver::{DevicePtr, DevicePtrMut};

use crate::buffers::{CudaCsr, CudaVector};
use crate::context::CudaContext;
use crate::error::{CudaError, Result};
use crate::runtime;
use crate::sparse_context::CudaSparseContext;

/// Default tolerance for the singularity test in cuSOLVER.
pub const DEFAULT_TOLERANCE: f64 = 1e-14;

/// Configuration for [`CudaCholeskyBackend`].
#[derive(Debug, Clone)]
pub struct CudaConfig {
    /// CUDA device ordinal.
    pub device_id: usize,
    /// Pivots at or below this magnitude count as breakdown.
    pub tolerance: f64,
}

impl Default for CudaConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl CudaConfig {
    pub fn with_device(mut self, device_id: usize) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Numeric factorization token for a matrix of the recorded shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CudaFactorization {
    n: usize,
    nnz: usize,
}

/// Sparse SPD solver running on one CUDA device.
pub struct CudaCholeskyBackend {
    sparse: CudaSparseContext,
    config: CudaConfig,
    analyzed: Option<(usize, usize)>,
}

impl CudaCholeskyBackend {
    /// Create a backend on an existing device context.
    pub fn new(cuda_ctx: Arc<CudaContext>, config: CudaConfig) -> Result<Self> {
        let sparse = CudaSparseContext::new(cuda_ctx)?;
        Ok(Self {
            sparse,
            config,
            analyzed: None,
        })
    }

    /// Create a backend on the process-wide device context.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::Context`] if [`runtime::init`] has not been
    /// called or the context is on another device.
    pub fn from_runtime(config: CudaConfig) -> SolverResult<Self> {
        let ctx = runtime::get()?;
        if ctx.device_id() != config.device_id {
            return Err(SolverError::Context(format!(
                "device context is on device {}, requested {}",
                ctx.device_id(),
                config.device_id
            )));
        }
        Ok(Self::new(ctx, config)?)
    }

    pub fn config(&self) -> &CudaConfig {
        &self.config
    }

    pub fn cuda_context(&self) -> &Arc<CudaContext> {
        self.sparse.cuda_context()
    }

    fn check_factor(&self, matrix: &CudaCsr, factor: &CudaFactorization) -> Result<()> {
        if factor.n != matrix.nrows() || factor.nnz != matrix.nnz() {
            return Err(CudaError::InvalidDimension(format!(
                "factorization is for n={}, nnz={}, matrix has n={}, nnz={}",
                factor.n,
                factor.nnz,
                matrix.nrows(),
                matrix.nnz()
            )));
        }
        Ok(())
    }

    fn csrlsvchol(&self, matrix: &CudaCsr, rhs: &CudaVector, x: &mut CudaVector) -> Result<()> {
        let n = i32::try_from(matrix.nrows())
            .map_err(|_| CudaError::InvalidDimension(format!("n={} too large", matrix.nrows())))?;
        let nnz = i32::try_from(matrix.nnz())
            .map_err(|_| CudaError::InvalidDimension(format!("nnz={} too large", matrix.nnz())))?;

        let stream = self.sparse.cuda_context().stream().clone();
        let (val_ptr, _val_guard) = matrix.values.device_ptr(&stream);
        let (row_ptr, _row_guard) = matrix.row_ptr.device_ptr(&stream);
        let (col_ptr, _col_guard) = matrix.col_idx.device_ptr(&stream);
        let (b_ptr, _b_guard) = rhs.data.device_ptr(&stream);
        let (x_ptr, _x_guard) = x.data.device_ptr_mut(&stream);

        let mut singularity: i32 = -1;
        let status = unsafe {
            cusolver_sys::cusolverSpDcsrlsvchol(
                self.sparse.cusolver_sp_handle(),
                n,
                nnz,
                self.sparse.general_descr() as cusolver_sys::cusparseMatDescr_t,
                val_ptr as *const f64,
                row_ptr as *const i32,
                col_ptr as *const i32,
                b_ptr as *const f64,
                self.config.tolerance,
                0,
                x_ptr as *mut f64,
                &mut singularity,
            )
        };

        drop(_val_guard);
        drop(_row_guard);
        drop(_col_guard);
        drop(_b_guard);
        drop(_x_guard);

        if status == cusolver_sys::cusolverStatus_t::CUSOLVER_STATUS_ALLOC_FAILED {
            return Err(CudaError::MemoryAlloc("cusolverSpDcsrlsvchol workspace".into()));
        }
        if status != cusolver_sys::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
            return Err(CudaError::Cusolver {
                code: status as i32,
                message: format!("cusolverSpDcsrlsvchol failed: {:?}", status),
            });
        }
        if singularity >= 0 {
            return Err(CudaError::NotPositiveDefinite {
                row: singularity as usize,
            });
        }
        Ok(())
    }
}

impl DeviceTransfer for CudaCholeskyBackend {
    type Matrix = CudaCsr;
    type Vector = CudaVector;

    fn upload_matrix(&self, matrix: &CsrMatrix) -> SolverResult<CudaCsr> {
        Ok(CudaCsr::upload(self.cuda_context().stream(), matrix)?)
    }

    fn download_matrix(&self, matrix: &CudaCsr) -> SolverResult<CsrMatrix> {
        Ok(matrix.download(self.cuda_context().stream())?)
    }

    fn upload_vector(&self, v: &[f64]) -> SolverResult<CudaVector> {
        Ok(CudaVector::upload(self.cuda_context().stream(), v)?)
    }

    fn download_vector(&self, v: &CudaVector) -> SolverResult<Vec<f64>> {
        Ok(v.download(self.cuda_context().stream())?)
    }

    fn alloc_vector(&self, len: usize) -> SolverResult<CudaVector> {
        Ok(CudaVector::zeros(self.cuda_context().stream(), len)?)
    }

    fn synchronize(&self) -> SolverResult<()> {
        Ok(self.cuda_context().synchronize()?)
    }
}

impl SparseSolverBackend for CudaCholeskyBackend {
    type Factorization = CudaFactorization;

    fn name(&self) -> &str {
        "cuda"
    }

    fn analyze(&mut self, matrix: &CudaCsr) -> SolverResult<()> {
        if matrix.nrows() != matrix.ncols() {
            return Err(SolverError::Shape(format!(
                "matrix is {}x{}, expected square",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        if i32::try_from(matrix.nnz()).is_err() {
            return Err(CudaError::InvalidDimension(format!(
                "nnz={} exceeds the 32-bit index range",
                matrix.nnz()
            ))
            .into());
        }
        self.analyzed = Some((matrix.nrows(), matrix.nnz()));
        log::debug!(
            "cuda analyze: n={}, nnz={}",
            matrix.nrows(),
            matrix.nnz()
        );
        Ok(())
    }

    fn factorize(&mut self, matrix: &CudaCsr) -> SolverResult<CudaFactorization> {
        match self.analyzed {
            Some((n, nnz)) if n == matrix.nrows() && nnz == matrix.nnz() => {
                Ok(CudaFactorization { n, nnz })
            }
            _ => Err(SolverError::Backend {
                status: BackendStatus::NotAnalyzed,
                message: "matrix shape differs from the last analyzed matrix".into(),
            }),
        }
    }

    fn solve(
        &mut self,
        matrix: &CudaCsr,
        factor: &CudaFactorization,
        rhs: &CudaVector,
        x: &mut CudaVector,
    ) -> SolverResult<()> {
        self.check_factor(matrix, factor)?;
        if rhs.len() != factor.n || x.len() != factor.n {
            return Err(SolverError::Shape(format!(
                "vectors of length {} and {} for n={}",
                rhs.len(),
                x.len(),
                factor.n
            )));
        }
        Ok(self.csrlsvchol(matrix, rhs, x)?)
    }
}
