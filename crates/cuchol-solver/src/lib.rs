//! Reordering-aware sparse Cholesky solve pipeline.
//!
//! This crate drives a sparse SPD solve through a pluggable backend:
//!
//! - [`SparseSolverBackend`] and [`DeviceTransfer`]: the backend capability
//!   the pipeline is written against
//! - [`HostCholeskyBackend`]: an up-looking LDLᵀ reference backend in host
//!   memory
//! - [`HostPhase`]: ordering and permutation before device work
//! - [`SolverSession`]: the full order/factorize/solve/restore pipeline
//! - [`ProcessContext`]: explicit lifecycle for process-wide handles
//!
//! # Example
//!
//! ```rust
//! use cuchol_core::CsrMatrix;
//! use cuchol_solver::{HostCholeskyBackend, SolverSession};
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
//!
//! let mut session = SolverSession::new(HostCholeskyBackend::new());
//! let x = session.solve(&a, &[1.0, 1.0, 1.0], true).unwrap();
//! assert!(a.residual_norm(&x, &[1.0, 1.0, 1.0]).unwrap() < 1e-12);
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod phase;
pub mod session;

pub use backend::{
    ComputeBackend, DeviceMatrix, DeviceTransfer, DeviceVector, SparseSolverBackend,
};
pub use config::SolverConfig;
pub use context::ProcessContext;
pub use error::{BackendStatus, Error, Result};
pub use host::{HostCholeskyBackend, HostCholeskyFactor};
pub use phase::HostPhase;
pub use session::{SolveStats, SolverSession};
