//! Backend capability traits and backend selection.
//!
//! A backend is split into two traits:
//!
//! - [`DeviceTransfer`]: moving CSR matrices and dense vectors between host
//!   memory and wherever the backend computes. Every call is a synchronous
//!   boundary.
//! - [`SparseSolverBackend`]: the numeric capability, symbolic analysis,
//!   numeric Cholesky factorization and the triangular solves.
//!
//! [`ComputeBackend`] names a backend for runtime selection. Probing for GPU
//! availability is left to the caller.

use std::fmt;

use cuchol_core::CsrMatrix;

use crate::error::Result;

/// Shape of a backend-resident CSR matrix.
pub trait DeviceMatrix {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
    fn nnz(&self) -> usize;
}

/// Length of a backend-resident dense vector.
pub trait DeviceVector {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Host/device data movement.
pub trait DeviceTransfer {
    /// CSR matrix resident in backend memory.
    type Matrix: DeviceMatrix;
    /// Dense `f64` vector resident in backend memory.
    type Vector: DeviceVector;

    fn upload_matrix(&self, matrix: &CsrMatrix) -> Result<Self::Matrix>;

    /// Copy a resident matrix back to the host, pattern and values.
    fn download_matrix(&self, matrix: &Self::Matrix) -> Result<CsrMatrix>;

    fn upload_vector(&self, v: &[f64]) -> Result<Self::Vector>;

    fn download_vector(&self, v: &Self::Vector) -> Result<Vec<f64>>;

    /// Allocate a zeroed vector of `len` entries.
    fn alloc_vector(&self, len: usize) -> Result<Self::Vector>;

    /// Block until all queued work has completed.
    fn synchronize(&self) -> Result<()>;
}

/// Sparse Cholesky factorization and triangular-solve capability.
///
/// The session drives a backend in a fixed sequence:
///
/// ```text
/// analyze(A)        symbolic phase, pattern only
/// factorize(A) -> F numeric phase
/// solve(A, F, b, x) forward/backward substitution, any number of times
/// ```
///
/// `analyze` may be skipped when the pattern has not changed since the last
/// call. Only the lower triangle of `A` is read.
pub trait SparseSolverBackend: DeviceTransfer {
    /// Numeric factorization state, exclusively owned by the caller of
    /// [`factorize`](Self::factorize).
    type Factorization;

    /// Short backend name for logs.
    fn name(&self) -> &str;

    fn analyze(&mut self, matrix: &Self::Matrix) -> Result<()>;

    fn factorize(&mut self, matrix: &Self::Matrix) -> Result<Self::Factorization>;

    /// Solve `A x = rhs` into `x` using a factorization of `matrix`.
    ///
    /// Backends whose library fuses factorization and solve read `matrix`
    /// here; the others only need `factor`.
    fn solve(
        &mut self,
        matrix: &Self::Matrix,
        factor: &Self::Factorization,
        rhs: &Self::Vector,
        x: &mut Self::Vector,
    ) -> Result<()>;
}

impl DeviceMatrix for CsrMatrix {
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CsrMatrix::ncols(self)
    }

    fn nnz(&self) -> usize {
        CsrMatrix::nnz(self)
    }
}

impl DeviceVector for Vec<f64> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// The compute backend to solve on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComputeBackend {
    /// Host reference backend (always available).
    #[default]
    Host,
    /// NVIDIA CUDA backend.
    Cuda {
        /// CUDA device ordinal.
        device_id: usize,
    },
}

impl ComputeBackend {
    /// Parse a backend name.
    ///
    /// Accepts `"auto"`, `"host"`, `"cpu"` and `"cuda"`. For `"auto"`,
    /// returns `Host`; the caller should probe GPU availability separately
    /// and upgrade the result.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "auto" | "host" | "cpu" => Some(ComputeBackend::Host),
            "cuda" | "gpu" => Some(ComputeBackend::Cuda { device_id: 0 }),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ComputeBackend::Host => "host",
            ComputeBackend::Cuda { .. } => "CUDA",
        }
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeBackend::Host => write!(f, "host"),
            ComputeBackend::Cuda { device_id } => write!(f, "CUDA (device {})", device_id),
        }
    }
}
