//! Host-resident sparse Cholesky backend.
//!
//! Computes `A = L D L^T` with unit lower-triangular `L` and strictly
//! positive diagonal `D`, which is the Cholesky factorization
//! `A = (L D^½)(L D^½)^T` without square roots. Useful as a reference for
//! device backends and on machines without an accelerator.
//!
//! # Algorithm
//!
//! Symbolic phase (elimination tree and column counts of `L`):
//!
//! ```text
//! for k in 0..n:
//!   for each j < k stored in row k:
//!     walk i = j up the tree until a node already marked for k:
//!       parent(i) = k if i has no parent yet
//!       count(i) += 1
//! ```
//!
//! Numeric phase (up-looking): row `k` of `L` is the solution of a sparse
//! triangular system whose nonzero pattern is the union of the tree paths
//! from each `j` in row `k` towards `k`, visited in topological order.
//!
//! Only entries on or below the diagonal are read.

use cuchol_core::CsrMatrix;

use crate::backend::{DeviceTransfer, SparseSolverBackend};
use crate::error::{BackendStatus, Error, Result};

/// Default relative pivot tolerance: a pivot `d_k <= tol * max|a_ii|` is
/// treated as a failure.
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 1e-14;

/// Elimination tree and column layout of `L`.
#[derive(Debug, Clone)]
struct Symbolic {
    n: usize,
    fingerprint: u64,
    parent: Vec<Option<usize>>,
    /// Column pointers of `L` (strictly lower part), length `n + 1`.
    l_colptr: Vec<usize>,
}

/// Numeric factors `L` (unit diagonal omitted, column-major) and `D`.
#[derive(Debug, Clone)]
pub struct HostCholeskyFactor {
    n: usize,
    l_colptr: Vec<usize>,
    l_rowidx: Vec<usize>,
    l_values: Vec<f64>,
    diag: Vec<f64>,
}

impl HostCholeskyFactor {
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Stored entries of `L` below the diagonal.
    pub fn nnz_l(&self) -> usize {
        self.l_rowidx.len()
    }

    /// The diagonal `D` of `L D L^T`.
    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    /// Natural log of `det(A)`.
    pub fn log_determinant(&self) -> f64 {
        self.diag.iter().map(|d| d.ln()).sum()
    }

    /// Solve in place: forward substitution with `L`, diagonal scaling,
    /// backward substitution with `L^T`.
    fn solve_in_place(&self, x: &mut [f64]) {
        for j in 0..self.n {
            let xj = x[j];
            for p in self.l_colptr[j]..self.l_colptr[j + 1] {
                x[self.l_rowidx[p]] -= self.l_values[p] * xj;
            }
        }
        for (xj, dj) in x.iter_mut().zip(&self.diag) {
            *xj /= dj;
        }
        for j in (0..self.n).rev() {
            let mut xj = x[j];
            for p in self.l_colptr[j]..self.l_colptr[j + 1] {
                xj -= self.l_values[p] * x[self.l_rowidx[p]];
            }
            x[j] = xj;
        }
    }
}

/// Sparse Cholesky backend running entirely in host memory.
///
/// Its "device" buffers are plain [`CsrMatrix`] and `Vec<f64>`, so uploads
/// and downloads are copies and [`synchronize`](DeviceTransfer::synchronize)
/// is a no-op.
#[derive(Debug, Clone)]
pub struct HostCholeskyBackend {
    pivot_tolerance: f64,
    symbolic: Option<Symbolic>,
}

impl Default for HostCholeskyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCholeskyBackend {
    pub fn new() -> Self {
        Self {
            pivot_tolerance: DEFAULT_PIVOT_TOLERANCE,
            symbolic: None,
        }
    }

    /// Set the pivot tolerance used to detect a non positive-definite matrix.
    ///
    /// The tolerance is relative to the largest diagonal magnitude, so
    /// scaling `A` does not change which matrices are accepted.
    pub fn with_pivot_tolerance(mut self, tol: f64) -> Self {
        self.pivot_tolerance = tol;
        self
    }

    pub fn pivot_tolerance(&self) -> f64 {
        self.pivot_tolerance
    }

    /// Predicted number of entries of `L` below the diagonal, once analyzed.
    pub fn predicted_nnz_l(&self) -> Option<usize> {
        self.symbolic.as_ref().map(|s| s.l_colptr[s.n])
    }

    fn require_square(matrix: &CsrMatrix) -> Result<usize> {
        if !matrix.is_square() {
            return Err(Error::Shape(format!(
                "cholesky needs a square matrix, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Ok(matrix.nrows())
    }
}

impl DeviceTransfer for HostCholeskyBackend {
    type Matrix = CsrMatrix;
    type Vector = Vec<f64>;

    fn upload_matrix(&self, matrix: &CsrMatrix) -> Result<CsrMatrix> {
        Ok(matrix.clone())
    }

    fn download_matrix(&self, matrix: &CsrMatrix) -> Result<CsrMatrix> {
        Ok(matrix.clone())
    }

    fn upload_vector(&self, v: &[f64]) -> Result<Vec<f64>> {
        Ok(v.to_vec())
    }

    fn download_vector(&self, v: &Vec<f64>) -> Result<Vec<f64>> {
        Ok(v.clone())
    }

    fn alloc_vector(&self, len: usize) -> Result<Vec<f64>> {
        Ok(vec![0.0; len])
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}

impl SparseSolverBackend for HostCholeskyBackend {
    type Factorization = HostCholeskyFactor;

    fn name(&self) -> &str {
        "host"
    }

    fn analyze(&mut self, matrix: &CsrMatrix) -> Result<()> {
        let n = Self::require_square(matrix)?;

        let mut parent = vec![None; n];
        let mut flag = vec![usize::MAX; n];
        let mut l_nz = vec![0usize; n];

        for k in 0..n {
            flag[k] = k;
            let (cols, _) = matrix.row(k);
            for &j in cols.iter().filter(|&&j| j < k) {
                let mut i = j;
                while flag[i] != k {
                    let up = *parent[i].get_or_insert(k);
                    l_nz[i] += 1;
                    flag[i] = k;
                    i = up;
                }
            }
        }

        let mut l_colptr = Vec::with_capacity(n + 1);
        l_colptr.push(0);
        let mut acc = 0;
        for count in &l_nz {
            acc += count;
            l_colptr.push(acc);
        }

        log::debug!(
            "host symbolic analysis: n={}, nnz(A)={}, nnz(L)={}",
            n,
            matrix.nnz(),
            acc
        );

        self.symbolic = Some(Symbolic {
            n,
            fingerprint: matrix.pattern().fingerprint(),
            parent,
            l_colptr,
        });
        Ok(())
    }

    fn factorize(&mut self, matrix: &CsrMatrix) -> Result<HostCholeskyFactor> {
        let n = Self::require_square(matrix)?;
        let symbolic = match &self.symbolic {
            Some(s) if s.n == n && s.fingerprint == matrix.pattern().fingerprint() => s,
            _ => {
                return Err(Error::Backend {
                    status: BackendStatus::NotAnalyzed,
                    message: "pattern differs from the last analyzed pattern".into(),
                });
            }
        };

        let l_colptr = symbolic.l_colptr.clone();
        let nnz_l = l_colptr[n];
        let mut l_rowidx = vec![0usize; nnz_l];
        let mut l_values = vec![0.0; nnz_l];
        let mut diag = vec![0.0; n];

        let threshold = self.pivot_tolerance * max_diagonal(matrix);

        let mut y = vec![0.0; n];
        let mut l_nz = vec![0usize; n];
        let mut flag = vec![usize::MAX; n];
        let mut path = vec![0usize; n];
        let mut stack = vec![0usize; n];

        for k in 0..n {
            flag[k] = k;
            y[k] = 0.0;
            let mut top = n;

            let (cols, vals) = matrix.row(k);
            for (&j, &v) in cols.iter().zip(vals).filter(|&(&j, _)| j <= k) {
                y[j] += v;
                let mut len = 0;
                let mut i = j;
                while flag[i] != k {
                    path[len] = i;
                    len += 1;
                    flag[i] = k;
                    i = match symbolic.parent[i] {
                        Some(p) => p,
                        None => {
                            return Err(Error::Backend {
                                status: BackendStatus::NotAnalyzed,
                                message: format!("row {} reaches a root of the elimination tree", k),
                            });
                        }
                    };
                }
                while len > 0 {
                    len -= 1;
                    top -= 1;
                    stack[top] = path[len];
                }
            }

            let mut dk = y[k];
            y[k] = 0.0;
            for &i in &stack[top..n] {
                let yi = y[i];
                y[i] = 0.0;
                let start = l_colptr[i];
                let end = start + l_nz[i];
                for p in start..end {
                    y[l_rowidx[p]] -= l_values[p] * yi;
                }
                let l_ki = yi / diag[i];
                dk -= l_ki * yi;
                l_rowidx[end] = k;
                l_values[end] = l_ki;
                l_nz[i] += 1;
            }

            if !(dk > threshold) {
                return Err(Error::Backend {
                    status: BackendStatus::NotPositiveDefinite { row: k },
                    message: format!("pivot {:e} at row {}", dk, k),
                });
            }
            diag[k] = dk;
        }

        Ok(HostCholeskyFactor {
            n,
            l_colptr,
            l_rowidx,
            l_values,
            diag,
        })
    }

    fn solve(
        &mut self,
        _matrix: &CsrMatrix,
        factor: &HostCholeskyFactor,
        rhs: &Vec<f64>,
        x: &mut Vec<f64>,
    ) -> Result<()> {
        if rhs.len() != factor.n || x.len() != factor.n {
            return Err(Error::DimensionMismatch {
                expected: factor.n,
                actual: if rhs.len() != factor.n { rhs.len() } else { x.len() },
                context: "host triangular solve".into(),
            });
        }
        x.copy_from_slice(rhs);
        factor.solve_in_place(x);
        Ok(())
    }
}

/// Largest `|a_ii|` over the stored diagonal.
fn max_diagonal(matrix: &CsrMatrix) -> f64 {
    (0..matrix.nrows())
        .filter_map(|k| {
            let (cols, vals) = matrix.row(k);
            cols.iter().position(|&j| j == k).map(|p| vals[p].abs())
        })
        .fold(0.0, f64::max)
}
