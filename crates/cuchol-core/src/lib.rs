//! Sparse matrix structures and fill-reducing orderings for cuchol.
//!
//! This crate holds everything on the host side of the solve pipeline:
//! - [`CsrMatrix`] and [`CsrPattern`] compressed sparse row storage
//! - [`Permutation`] with its inverse
//! - the reverse Cuthill-McKee [`ordering`] engine
//! - the [`permute`] applier for matrices and vectors
//! - the [`validate`] layer run before any device work

pub mod csr;
pub mod error;
pub mod ordering;
pub mod permutation;
pub mod permute;
pub mod validate;

pub use csr::{CsrMatrix, CsrPattern};
pub use error::{Error, Result};
pub use ordering::{
    OrderingMethod, OrderingStats, compute_ordering, compute_ordering_with, ordering_stats,
};
pub use permutation::Permutation;
pub use permute::{permute_matrix, permute_vector, unpermute_vector};
pub use validate::validate_system;
