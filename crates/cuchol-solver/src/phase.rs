//! Host phase of the solve pipeline.
//!
//! Ordering is a graph computation on the sparsity pattern and always runs
//! in host memory. [`HostPhase`] takes a host-resident matrix, computes or
//! accepts a permutation, and produces the reordered matrix the device phase
//! will upload. It also carries the permutation so right-hand sides can be
//! moved into the new ordering and solutions moved back.
//!
//! Callers who solve many systems with one sparsity pattern can run the host
//! phase once, keep [`HostPhase::permutation`], and hand the reordered matrix
//! to [`SolverSession::solve`](crate::SolverSession::solve) with
//! `reorder = false`.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use cuchol_core::permute::permute_matrix_with_threshold;
use cuchol_core::{
    CsrMatrix, Permutation, compute_ordering_with, permute_vector, unpermute_vector, validate,
};

use crate::config::SolverConfig;
use crate::error::Result;

/// A system matrix in the ordering the backend will factorize.
#[derive(Debug, Clone)]
pub struct HostPhase<'a> {
    matrix: Cow<'a, CsrMatrix>,
    permutation: Option<Permutation>,
    bandwidth: (usize, usize),
    ordering_time: Duration,
}

impl<'a> HostPhase<'a> {
    /// Keep the caller's ordering. Borrows the matrix without copying.
    pub fn natural(matrix: &'a CsrMatrix) -> Self {
        let bw = matrix.pattern().bandwidth();
        Self {
            matrix: Cow::Borrowed(matrix),
            permutation: None,
            bandwidth: (bw, bw),
            ordering_time: Duration::ZERO,
        }
    }

    /// Compute the configured ordering and reorder the matrix.
    pub fn order(matrix: &'a CsrMatrix, config: &SolverConfig) -> Result<Self> {
        let start = Instant::now();
        let perm = compute_ordering_with(matrix.pattern(), config.ordering)?;
        let ordering_time = start.elapsed();
        let mut phase = Self::with_permutation(matrix, perm, config)?;
        phase.ordering_time = ordering_time;
        Ok(phase)
    }

    /// Reorder with a permutation computed earlier for this pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch)
    /// if the permutation length differs from the matrix dimension.
    pub fn with_permutation(
        matrix: &'a CsrMatrix,
        perm: Permutation,
        config: &SolverConfig,
    ) -> Result<Self> {
        validate::ensure_permutation_len(matrix.nrows(), &perm)?;
        if perm.is_identity() {
            return Ok(Self::natural(matrix));
        }

        let before = matrix.pattern().bandwidth();
        let reordered =
            permute_matrix_with_threshold(matrix, &perm, config.parallel_permute_threshold)?;
        let after = reordered.pattern().bandwidth();
        log::debug!(
            "host phase: n={}, bandwidth {} -> {}",
            matrix.nrows(),
            before,
            after
        );

        Ok(Self {
            matrix: Cow::Owned(reordered),
            permutation: Some(perm),
            bandwidth: (before, after),
            ordering_time: Duration::ZERO,
        })
    }

    /// The matrix in backend ordering.
    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    /// The permutation applied, `None` if the original ordering is kept.
    pub fn permutation(&self) -> Option<&Permutation> {
        self.permutation.as_ref()
    }

    pub fn into_permutation(self) -> Option<Permutation> {
        self.permutation
    }

    /// Bandwidth before and after reordering.
    pub fn bandwidth(&self) -> (usize, usize) {
        self.bandwidth
    }

    pub fn ordering_time(&self) -> Duration {
        self.ordering_time
    }

    /// Move a right-hand side into backend ordering.
    pub fn permute_rhs<'b>(&self, rhs: &'b [f64]) -> Result<Cow<'b, [f64]>> {
        permute_rhs(self.permutation.as_ref(), rhs)
    }

    /// Move a solution back to the caller's ordering.
    pub fn restore_solution(&self, x: Vec<f64>) -> Result<Vec<f64>> {
        restore_solution(self.permutation.as_ref(), x)
    }
}

pub(crate) fn permute_rhs<'b>(
    perm: Option<&Permutation>,
    rhs: &'b [f64],
) -> Result<Cow<'b, [f64]>> {
    Ok(match perm {
        Some(perm) => Cow::Owned(permute_vector(rhs, perm)?),
        None => Cow::Borrowed(rhs),
    })
}

pub(crate) fn restore_solution(perm: Option<&Permutation>, x: Vec<f64>) -> Result<Vec<f64>> {
    Ok(match perm {
        Some(perm) => unpermute_vector(&x, perm)?,
        None => x,
    })
}
