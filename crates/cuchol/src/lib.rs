//! # cuchol
//!
//! Sparse symmetric positive definite solves with fill-reducing reordering.
//!
//! cuchol solves `A x = b` for a sparse SPD matrix `A` in CSR form:
//! - reverse Cuthill-McKee ordering of the sparsity pattern
//! - symmetric permutation `P A Pᵀ` and `P b`
//! - sparse Cholesky factorization and triangular solves on a backend
//! - the solution permuted back to the caller's ordering
//!
//! ## Quick Start
//!
//! ```rust
//! use cuchol::prelude::*;
//!
//! let a = CsrMatrix::from_triplets(
//!     3,
//!     3,
//!     &[
//!         (0, 0, 4.0), (0, 1, -1.0),
//!         (1, 0, -1.0), (1, 1, 4.0), (1, 2, -1.0),
//!         (2, 1, -1.0), (2, 2, 4.0),
//!     ],
//! )
//! .unwrap();
//! let b = [1.0, 2.0, 3.0];
//!
//! let x = cuchol::solve(&a, &b, true).unwrap();
//! assert!(a.residual_norm(&x, &b).unwrap() < 1e-12);
//! ```
//!
//! ## Reusing an ordering
//!
//! ```rust
//! use cuchol::prelude::*;
//!
//! let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 2.0), (1, 1, 3.0)]).unwrap();
//! let perm = cuchol::compute_ordering(&a).unwrap();
//!
//! let mut session = SolverSession::new(HostCholeskyBackend::new());
//! for b in [[1.0, 1.0], [2.0, 3.0]] {
//!     let x = session.solve_with_ordering(&a, &b, &perm).unwrap();
//!     assert!(a.residual_norm(&x, &b).unwrap() < 1e-12);
//! }
//! ```
//!
//! ## Features
//!
//! - `cuda` - Enable the cuSOLVER backend (requires an NVIDIA GPU). The
//!   device context is never created implicitly: call
//!   `cuchol::backend_cuda::runtime::init(device_id)` once, after which
//!   [`solve`] runs on that device.

pub use cuchol_core as core;
pub use cuchol_solver as solver;

#[cfg(feature = "cuda")]
pub use cuchol_backend_cuda as backend_cuda;

pub use cuchol_core::{
    CsrMatrix, CsrPattern, OrderingMethod, OrderingStats, Permutation, ordering_stats,
    permute_matrix, permute_vector, unpermute_vector, validate_system,
};

pub use cuchol_solver::{
    BackendStatus, ComputeBackend, DeviceMatrix, DeviceTransfer, DeviceVector, Error,
    HostCholeskyBackend, HostCholeskyFactor, HostPhase, ProcessContext, Result, SolveStats,
    SolverConfig, SolverSession, SparseSolverBackend,
};

/// Solve `A x = b` on the best available backend.
///
/// With `reorder`, a reverse Cuthill-McKee ordering is applied before
/// factorization; the solution is always in the caller's ordering.
///
/// Only entries on or below the diagonal of `matrix` are read, so a matrix
/// must store at least its lower triangle.
///
/// # Errors
///
/// See [`SolverSession::solve`].
pub fn solve(matrix: &CsrMatrix, rhs: &[f64], reorder: bool) -> Result<Vec<f64>> {
    solve_on(&detect_backend(), matrix, rhs, reorder)
}

/// Solve `A x = b` on a specific backend.
///
/// Inputs are validated before any backend is created.
///
/// # Errors
///
/// Returns [`Error::Unavailable`] for [`ComputeBackend::Cuda`] when cuchol
/// was built without the `cuda` feature, and [`Error::Context`] when the
/// CUDA runtime has not been initialized on that device.
pub fn solve_on(
    backend: &ComputeBackend,
    matrix: &CsrMatrix,
    rhs: &[f64],
    reorder: bool,
) -> Result<Vec<f64>> {
    validate_system(matrix, rhs)?;
    log::debug!(
        "solving n={} nnz={} on {} (reorder={})",
        matrix.nrows(),
        matrix.nnz(),
        backend,
        reorder
    );
    match backend {
        ComputeBackend::Host => {
            SolverSession::new(HostCholeskyBackend::new()).solve(matrix, rhs, reorder)
        }
        ComputeBackend::Cuda { device_id } => solve_cuda(*device_id, matrix, rhs, reorder),
    }
}

/// Reverse Cuthill-McKee ordering of `matrix`'s sparsity pattern.
///
/// Compute once and pass to [`SolverSession::solve_with_ordering`] to solve
/// many systems that share a pattern.
pub fn compute_ordering(matrix: &CsrMatrix) -> Result<Permutation> {
    Ok(cuchol_core::compute_ordering(matrix.pattern())?)
}

/// The backend [`solve`] uses: the initialized CUDA device when built with
/// the `cuda` feature, otherwise the host backend.
pub fn detect_backend() -> ComputeBackend {
    match initialized_device() {
        Some(device_id) => ComputeBackend::Cuda { device_id },
        None => ComputeBackend::Host,
    }
}

#[cfg(feature = "cuda")]
fn initialized_device() -> Option<usize> {
    backend_cuda::runtime::get().ok().map(|ctx| ctx.device_id())
}

#[cfg(not(feature = "cuda"))]
fn initialized_device() -> Option<usize> {
    None
}

#[cfg(feature = "cuda")]
fn solve_cuda(device_id: usize, matrix: &CsrMatrix, rhs: &[f64], reorder: bool) -> Result<Vec<f64>> {
    use backend_cuda::{CudaCholeskyBackend, CudaConfig};

    let backend = CudaCholeskyBackend::from_runtime(CudaConfig::default().with_device(device_id))?;
    SolverSession::new(backend).solve(matrix, rhs, reorder)
}

#[cfg(not(feature = "cuda"))]
fn solve_cuda(device_id: usize, _: &CsrMatrix, _: &[f64], _: bool) -> Result<Vec<f64>> {
    Err(Error::Unavailable(format!(
        "CUDA device {} requested but cuchol was built without the cuda feature",
        device_id
    )))
}

/// Prelude module containing commonly used types and functions.
///
/// ```rust
/// use cuchol::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ComputeBackend, CsrMatrix, Error, HostCholeskyBackend, OrderingMethod, Permutation,
        Result, SolverConfig, SolverSession, compute_ordering, solve, solve_on,
    };
}
