//! The solver session: order, permute, factorize, solve, restore.
//!
//! A [`SolverSession`] owns one backend and drives it through two phases:
//!
//! 1. **Host phase** ([`HostPhase`]): validation, ordering and permutation
//!    of the matrix and right-hand side, all in host memory.
//! 2. **Device phase**: upload, symbolic analysis, numeric factorization,
//!    triangular solves and download. Every transfer is a synchronous
//!    boundary and is counted in [`SolveStats`].
//!
//! The session keeps the most recent factorization so further right-hand
//! sides can be solved with [`SolverSession::solve_prepared`]. Preparing a
//! new matrix or calling [`SolverSession::release`] drops it.
//!
//! Sessions are not shared between threads; use one session per thread.

use std::time::{Duration, Instant};

use cuchol_core::{CsrMatrix, Permutation, validate};

use crate::backend::{DeviceMatrix, DeviceVector, SparseSolverBackend};
use crate::config::SolverConfig;
use crate::error::{Error, Result};
use crate::phase::{self, HostPhase};

/// Counters and timings for the last solve call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveStats {
    /// Whether the system was reordered before factorization.
    pub reordered: bool,
    /// Bandwidth before and after reordering, when reordered.
    pub bandwidth: Option<(usize, usize)>,
    /// Symbolic analysis was skipped because the pattern was unchanged.
    pub analysis_reused: bool,
    /// Host to device copies (matrix or vector).
    pub host_to_device: usize,
    /// Device to host copies (matrix or vector).
    pub device_to_host: usize,
    pub ordering_time: Duration,
    pub factorize_time: Duration,
    pub solve_time: Duration,
}

impl SolveStats {
    fn new(reordered: bool) -> Self {
        Self {
            reordered,
            ..Self::default()
        }
    }

    /// Total transfers in either direction.
    pub fn transfers(&self) -> usize {
        self.host_to_device + self.device_to_host
    }
}

/// A factorization kept for repeated solves.
struct Prepared<B: SparseSolverBackend> {
    n: usize,
    matrix: B::Matrix,
    factor: B::Factorization,
    permutation: Option<Permutation>,
}

enum OrderingRequest<'p> {
    Keep,
    Compute,
    Given(&'p Permutation),
}

/// Reordering-aware SPD solver bound to one backend.
pub struct SolverSession<B: SparseSolverBackend> {
    backend: B,
    config: SolverConfig,
    prepared: Option<Prepared<B>>,
    /// Pattern fingerprint of the last successful analysis.
    analyzed: Option<u64>,
    workspace: Option<B::Vector>,
    stats: SolveStats,
}

impl<B: SparseSolverBackend> SolverSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SolverConfig::default())
    }

    pub fn with_config(backend: B, config: SolverConfig) -> Self {
        Self {
            backend,
            config,
            prepared: None,
            analyzed: None,
            workspace: None,
            stats: SolveStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Stats from the most recent solve or prepare call, including failed
    /// ones. A call rejected by validation leaves zeroed stats.
    pub fn last_stats(&self) -> &SolveStats {
        &self.stats
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Permutation of the prepared factorization, if it was reordered.
    pub fn permutation(&self) -> Option<&Permutation> {
        self.prepared.as_ref().and_then(|p| p.permutation.as_ref())
    }

    /// Drop the prepared factorization and the solve workspace.
    pub fn release(&mut self) {
        if self.prepared.take().is_some() {
            log::debug!("{}: released factorization", self.backend.name());
        }
        self.workspace = None;
    }

    /// Solve `A x = b` for a host-resident SPD matrix.
    ///
    /// With `reorder`, the configured fill-reducing ordering is computed and
    /// applied before factorization and the solution is returned in the
    /// caller's original ordering. The result is the same, up to rounding,
    /// either way.
    ///
    /// All validation happens before the backend is touched.
    ///
    /// Only entries on or below the diagonal are read. A matrix that stores
    /// just its upper triangle is solved as if it were diagonal; enable
    /// [`SolverConfig::check_symmetry`] to reject such input.
    ///
    /// # Errors
    ///
    /// - [`Error::Format`] for a malformed matrix or non-finite data
    /// - [`Error::Shape`] for a non-square matrix or a wrong `rhs` length
    /// - [`Error::Backend`] with
    ///   [`NotPositiveDefinite`](crate::BackendStatus::NotPositiveDefinite)
    ///   when factorization breaks down
    pub fn solve(&mut self, matrix: &CsrMatrix, rhs: &[f64], reorder: bool) -> Result<Vec<f64>> {
        self.stats = SolveStats::new(reorder);
        self.validate_system(matrix, rhs)?;
        if matrix.nrows() == 0 {
            return Ok(Vec::new());
        }
        let request = if reorder {
            OrderingRequest::Compute
        } else {
            OrderingRequest::Keep
        };
        self.run(reorder, |session, stats| {
            session.prepare_inner(matrix, request, stats)?;
            session.solve_prepared_inner(rhs, stats)
        })
    }

    /// Solve with an ordering computed earlier for this sparsity pattern.
    ///
    /// # Errors
    ///
    /// As [`solve`](Self::solve), plus [`Error::DimensionMismatch`] when the
    /// permutation length differs from the matrix dimension.
    pub fn solve_with_ordering(
        &mut self,
        matrix: &CsrMatrix,
        rhs: &[f64],
        perm: &Permutation,
    ) -> Result<Vec<f64>> {
        self.stats = SolveStats::new(true);
        self.validate_system(matrix, rhs)?;
        validate::ensure_permutation_len(matrix.nrows(), perm)?;
        self.run(true, |session, stats| {
            session.prepare_inner(matrix, OrderingRequest::Given(perm), stats)?;
            session.solve_prepared_inner(rhs, stats)
        })
    }

    /// Factorize `matrix` and keep the factorization for
    /// [`solve_prepared`](Self::solve_prepared).
    pub fn prepare(&mut self, matrix: &CsrMatrix, reorder: bool) -> Result<()> {
        self.stats = SolveStats::new(reorder);
        self.validate_matrix(matrix)?;
        let request = if reorder {
            OrderingRequest::Compute
        } else {
            OrderingRequest::Keep
        };
        self.run(reorder, |session, stats| {
            session.prepare_inner(matrix, request, stats)
        })
    }

    /// [`prepare`](Self::prepare) with a caller-supplied ordering.
    pub fn prepare_with_ordering(&mut self, matrix: &CsrMatrix, perm: &Permutation) -> Result<()> {
        self.stats = SolveStats::new(true);
        self.validate_matrix(matrix)?;
        validate::ensure_permutation_len(matrix.nrows(), perm)?;
        self.run(true, |session, stats| {
            session.prepare_inner(matrix, OrderingRequest::Given(perm), stats)
        })
    }

    /// Solve for another right-hand side with the prepared factorization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPrepared`] if nothing has been prepared, and
    /// [`Error::Shape`] or [`Error::Format`] for a bad `rhs`.
    pub fn solve_prepared(&mut self, rhs: &[f64]) -> Result<Vec<f64>> {
        let reordered = self.permutation().is_some();
        self.run(reordered, |session, stats| {
            session.solve_prepared_inner(rhs, stats)
        })
    }

    /// Solve a system already resident on the backend.
    ///
    /// Without `reorder` the data never leaves the device. With `reorder` the
    /// matrix and right-hand side are copied to the host for ordering, the
    /// reordered system is uploaded and solved, and the solution comes back
    /// to the device in the caller's ordering.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shape`] for a non-square matrix or a wrong `rhs`
    /// length, before any backend call.
    pub fn solve_device(
        &mut self,
        matrix: &B::Matrix,
        rhs: &B::Vector,
        reorder: bool,
    ) -> Result<B::Vector> {
        self.stats = SolveStats::new(reorder);
        validate::ensure_square(matrix.nrows(), matrix.ncols())?;
        validate::ensure_rhs_len(matrix.nrows(), rhs.len())?;
        self.run(reorder, |session, stats| {
            if reorder {
                session.solve_device_reordered(matrix, rhs, stats)
            } else {
                session.solve_device_resident(matrix, rhs, stats)
            }
        })
    }

    fn run<T, F>(&mut self, reordered: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self, &mut SolveStats) -> Result<T>,
    {
        let mut stats = SolveStats::new(reordered);
        let result = f(self, &mut stats);
        match &result {
            Ok(_) => log::debug!(
                "{}: reordered={}, bandwidth={:?}, reused={}, h2d={}, d2h={}, order {:?}, factor {:?}, solve {:?}",
                self.backend.name(),
                stats.reordered,
                stats.bandwidth,
                stats.analysis_reused,
                stats.host_to_device,
                stats.device_to_host,
                stats.ordering_time,
                stats.factorize_time,
                stats.solve_time
            ),
            Err(e) => log::warn!("{}: solve failed: {}", self.backend.name(), e),
        }
        self.stats = stats;
        result
    }

    fn validate_matrix(&self, matrix: &CsrMatrix) -> Result<()> {
        validate::validate_csr(matrix)?;
        validate::ensure_square(matrix.nrows(), matrix.ncols())?;
        validate::ensure_finite(matrix.values(), "matrix values")?;
        if self.config.check_symmetry && !matrix.pattern().is_structurally_symmetric() {
            return Err(Error::Format(
                "matrix pattern is not structurally symmetric".into(),
            ));
        }
        Ok(())
    }

    fn validate_system(&self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<()> {
        validate::validate_system(matrix, rhs)?;
        if self.config.check_symmetry && !matrix.pattern().is_structurally_symmetric() {
            return Err(Error::Format(
                "matrix pattern is not structurally symmetric".into(),
            ));
        }
        Ok(())
    }

    fn prepare_inner(
        &mut self,
        matrix: &CsrMatrix,
        request: OrderingRequest<'_>,
        stats: &mut SolveStats,
    ) -> Result<()> {
        // The old factorization goes first so its device memory is free
        // before the new upload.
        self.prepared = None;

        let host = match request {
            OrderingRequest::Keep => HostPhase::natural(matrix),
            OrderingRequest::Compute => HostPhase::order(matrix, &self.config)?,
            OrderingRequest::Given(perm) => {
                HostPhase::with_permutation(matrix, perm.clone(), &self.config)?
            }
        };
        stats.ordering_time = host.ordering_time();
        if host.permutation().is_some() {
            stats.bandwidth = Some(host.bandwidth());
        }

        let n = host.matrix().nrows();
        let fingerprint = host.matrix().pattern().fingerprint();
        let d_matrix = self.backend.upload_matrix(host.matrix())?;
        stats.host_to_device += 1;

        self.analyze_if_needed(&d_matrix, Some(fingerprint), stats)?;

        let start = Instant::now();
        let factor = self.backend.factorize(&d_matrix)?;
        stats.factorize_time = start.elapsed();

        self.prepared = Some(Prepared {
            n,
            matrix: d_matrix,
            factor,
            permutation: host.into_permutation(),
        });
        Ok(())
    }

    fn analyze_if_needed(
        &mut self,
        matrix: &B::Matrix,
        fingerprint: Option<u64>,
        stats: &mut SolveStats,
    ) -> Result<()> {
        if self.config.reuse_symbolic && fingerprint.is_some() && self.analyzed == fingerprint {
            stats.analysis_reused = true;
            return Ok(());
        }
        self.analyzed = None;
        self.backend.analyze(matrix)?;
        self.analyzed = fingerprint;
        Ok(())
    }

    fn solve_prepared_inner(&mut self, rhs: &[f64], stats: &mut SolveStats) -> Result<Vec<f64>> {
        let prepared = self.prepared.as_ref().ok_or(Error::NotPrepared)?;
        let n = prepared.n;
        validate::ensure_rhs_len(n, rhs.len())?;
        validate::ensure_finite(rhs, "right-hand side")?;

        let ordered = phase::permute_rhs(prepared.permutation.as_ref(), rhs)?;
        let d_rhs = self.backend.upload_vector(&ordered)?;
        stats.host_to_device += 1;

        let mut d_x = match self.workspace.take() {
            Some(x) if x.len() == n => x,
            _ => self.backend.alloc_vector(n)?,
        };

        let start = Instant::now();
        self.backend
            .solve(&prepared.matrix, &prepared.factor, &d_rhs, &mut d_x)?;
        self.backend.synchronize()?;
        stats.solve_time = start.elapsed();

        let x = self.backend.download_vector(&d_x)?;
        stats.device_to_host += 1;
        self.workspace = Some(d_x);

        phase::restore_solution(prepared.permutation.as_ref(), x)
    }

    fn solve_device_resident(
        &mut self,
        matrix: &B::Matrix,
        rhs: &B::Vector,
        stats: &mut SolveStats,
    ) -> Result<B::Vector> {
        self.analyze_if_needed(matrix, None, stats)?;

        let start = Instant::now();
        let factor = self.backend.factorize(matrix)?;
        stats.factorize_time = start.elapsed();

        let mut x = self.backend.alloc_vector(matrix.nrows())?;
        let start = Instant::now();
        self.backend.solve(matrix, &factor, rhs, &mut x)?;
        self.backend.synchronize()?;
        stats.solve_time = start.elapsed();
        Ok(x)
    }

    fn solve_device_reordered(
        &mut self,
        matrix: &B::Matrix,
        rhs: &B::Vector,
        stats: &mut SolveStats,
    ) -> Result<B::Vector> {
        let host_matrix = self.backend.download_matrix(matrix)?;
        stats.device_to_host += 1;
        self.validate_matrix(&host_matrix)?;

        let host_rhs = self.backend.download_vector(rhs)?;
        stats.device_to_host += 1;
        validate::ensure_finite(&host_rhs, "right-hand side")?;

        self.prepare_inner(&host_matrix, OrderingRequest::Compute, stats)?;
        let x = self.solve_prepared_inner(&host_rhs, stats)?;

        let d_x = self.backend.upload_vector(&x)?;
        stats.host_to_device += 1;
        Ok(d_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCholeskyBackend;
    use crate::error::BackendStatus;

    fn tridiag(n: usize) -> CsrMatrix {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 4.0));
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
                t.push((i + 1, i, -1.0));
            }
        }
        CsrMatrix::from_triplets(n, n, &t).unwrap()
    }

    fn assert_solves(a: &CsrMatrix, x: &[f64], b: &[f64]) {
        assert!(a.residual_norm(x, b).unwrap() < 1e-10);
    }

    #[test]
    fn test_solve_tridiagonal() {
        let a = tridiag(4);
        let b = vec![1.0; 4];
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        for reorder in [false, true] {
            let x = session.solve(&a, &b, reorder).unwrap();
            assert_solves(&a, &x, &b);
        }
    }

    #[test]
    fn test_empty_system() {
        let a = CsrMatrix::try_new(0, 0, vec![0], vec![], vec![]).unwrap();
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        assert!(session.solve(&a, &[], true).unwrap().is_empty());
        assert_eq!(session.last_stats().transfers(), 0);
    }

    #[test]
    fn test_not_prepared() {
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        assert!(matches!(
            session.solve_prepared(&[1.0]),
            Err(Error::NotPrepared)
        ));
    }

    #[test]
    fn test_stats_count_transfers() {
        let a = tridiag(5);
        let b = vec![1.0; 5];
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        session.solve(&a, &b, true).unwrap();
        let stats = session.last_stats();
        assert!(stats.reordered);
        assert_eq!(stats.host_to_device, 2);
        assert_eq!(stats.device_to_host, 1);
        assert!(!stats.analysis_reused);
    }

    #[test]
    fn test_symbolic_reuse_on_same_pattern() {
        let a = tridiag(6);
        let b = vec![1.0; 6];
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        session.solve(&a, &b, true).unwrap();
        session.solve(&a, &b, true).unwrap();
        assert!(session.last_stats().analysis_reused);

        let mut fresh = SolverSession::with_config(
            HostCholeskyBackend::new(),
            SolverConfig::default().without_symbolic_reuse(),
        );
        fresh.solve(&a, &b, true).unwrap();
        fresh.solve(&a, &b, true).unwrap();
        assert!(!fresh.last_stats().analysis_reused);
    }

    #[test]
    fn test_failed_factorization_clears_prepared() {
        let a = tridiag(3);
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        session.prepare(&a, false).unwrap();
        assert!(session.is_prepared());

        let indefinite = CsrMatrix::from_triplets(
            2,
            2,
            &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 1.0)],
        )
        .unwrap();
        let err = session.solve(&indefinite, &[1.0, 1.0], false).unwrap_err();
        assert!(matches!(
            err,
            Error::Backend {
                status: BackendStatus::NotPositiveDefinite { .. },
                ..
            }
        ));
        assert!(!session.is_prepared());
    }

    #[test]
    fn test_symmetry_check() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (0, 1, 0.5), (1, 1, 1.0)]).unwrap();
        let mut session = SolverSession::with_config(
            HostCholeskyBackend::new(),
            SolverConfig::default().with_symmetry_check(),
        );
        assert!(matches!(
            session.solve(&a, &[1.0, 1.0], false),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_rejected_call_resets_stats() {
        let a = tridiag(4);
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        session.solve(&a, &[1.0; 4], true).unwrap();
        assert_eq!(session.last_stats().transfers(), 3);

        assert!(session.solve(&a, &[1.0; 3], false).is_err());
        assert_eq!(session.last_stats(), &SolveStats::default());
    }

    #[test]
    fn test_tiny_scale_system() {
        let mut a = tridiag(4);
        for v in a.values_mut() {
            *v *= 1e-15;
        }
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        let x = session.solve(&a, &[1e-15; 4], false).unwrap();
        let expected = session.solve(&tridiag(4), &[1.0; 4], false).unwrap();
        for (xi, ei) in x.iter().zip(&expected) {
            assert!((xi - ei).abs() < 1e-12);
        }
    }

    #[test]
    fn test_upper_triangle_only_rejected_by_symmetry_check() {
        let upper = CsrMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 4.0), (0, 1, -1.0), (1, 1, 4.0), (1, 2, -1.0), (2, 2, 4.0)],
        )
        .unwrap();
        let mut session = SolverSession::with_config(
            HostCholeskyBackend::new(),
            SolverConfig::default().with_symmetry_check(),
        );
        assert!(matches!(
            session.solve(&upper, &[1.0; 3], false),
            Err(Error::Format(_))
        ));
        assert_eq!(session.last_stats().transfers(), 0);
    }

    #[test]
    fn test_release() {
        // Path 0 - 3 - 1 - 2: any reverse Cuthill-McKee order relabels it.
        let a = CsrMatrix::from_triplets(
            4,
            4,
            &[
                (0, 0, 2.0),
                (1, 1, 2.0),
                (2, 2, 2.0),
                (3, 3, 2.0),
                (0, 3, -1.0),
                (3, 0, -1.0),
                (3, 1, -1.0),
                (1, 3, -1.0),
                (1, 2, -1.0),
                (2, 1, -1.0),
            ],
        )
        .unwrap();
        let mut session = SolverSession::new(HostCholeskyBackend::new());
        session.prepare(&a, true).unwrap();
        assert!(session.permutation().is_some());
        session.release();
        assert!(!session.is_prepared());
        assert!(session.permutation().is_none());
    }
}
