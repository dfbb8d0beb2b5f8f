//! Compressed sparse row (CSR) storage.
//!
//! [`CsrMatrix`] owns the three coupled CSR arrays. [`CsrPattern`] is a
//! borrowed view of the structure only (row pointers and column indices),
//! which is all the ordering engine and symbolic analysis need.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::validate;

/// Sparse matrix in compressed sparse row format.
///
/// - `row_ptr[i]..row_ptr[i + 1]` is the range of row `i` in `col_idx`/`values`
/// - `col_idx[k]` is the column of entry `k`
/// - `values[k]` is the value of entry `k`
///
/// Column indices inside a row do not have to be sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from raw arrays, checking every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the arrays do not describe a valid
    /// `nrows x ncols` CSR matrix.
    pub fn try_new(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        validate::validate_csr_parts(nrows, ncols, &row_ptr, &col_idx, values.len())?;
        Ok(Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Build from arrays already known to satisfy the CSR invariants.
    pub(crate) fn from_parts_unchecked(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        debug_assert!(
            validate::validate_csr_parts(nrows, ncols, &row_ptr, &col_idx, values.len()).is_ok()
        );
        Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Create from `(row, col, value)` triplets.
    ///
    /// Duplicate entries at the same position are summed and every row comes
    /// out with ascending column indices.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Result<Self> {
        let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(row, col, val) in triplets {
            if row >= nrows || col >= ncols {
                return Err(Error::Format(format!(
                    "triplet ({}, {}) outside {}x{} matrix",
                    row, col, nrows, ncols
                )));
            }
            *entries.entry((row, col)).or_insert(0.0) += val;
        }

        let mut row_ptr = vec![0usize; nrows + 1];
        let mut col_idx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());

        let mut current_row = 0;
        for (&(row, col), &val) in &entries {
            while current_row <= row {
                row_ptr[current_row] = col_idx.len();
                current_row += 1;
            }
            col_idx.push(col);
            values.push(val);
        }
        while current_row <= nrows {
            row_ptr[current_row] = col_idx.len();
            current_row += 1;
        }

        Ok(Self::from_parts_unchecked(
            nrows, ncols, row_ptr, col_idx, values,
        ))
    }

    /// The `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self::from_parts_unchecked(n, n, (0..=n).collect(), (0..n).collect(), vec![1.0; n])
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the values; the sparsity pattern stays fixed.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Borrow the sparsity pattern.
    pub fn pattern(&self) -> CsrPattern<'_> {
        CsrPattern {
            nrows: self.nrows,
            ncols: self.ncols,
            row_ptr: &self.row_ptr,
            col_idx: &self.col_idx,
        }
    }

    /// Decompose into `(nrows, ncols, row_ptr, col_idx, values)`.
    pub fn into_parts(self) -> (usize, usize, Vec<usize>, Vec<usize>, Vec<f64>) {
        (
            self.nrows,
            self.ncols,
            self.row_ptr,
            self.col_idx,
            self.values,
        )
    }

    /// True if column indices ascend strictly within every row.
    pub fn has_sorted_rows(&self) -> bool {
        self.pattern().has_sorted_rows()
    }

    /// Sparse matrix-vector product `y = A * x`.
    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut y = vec![0.0; self.nrows];
        self.mul_vec_into(x, &mut y)?;
        Ok(y)
    }

    /// Sparse matrix-vector product into a caller buffer.
    pub fn mul_vec_into(&self, x: &[f64], y: &mut [f64]) -> Result<()> {
        if x.len() != self.ncols {
            return Err(Error::DimensionMismatch {
                expected: self.ncols,
                actual: x.len(),
                context: "spmv input".into(),
            });
        }
        if y.len() != self.nrows {
            return Err(Error::DimensionMismatch {
                expected: self.nrows,
                actual: y.len(),
                context: "spmv output".into(),
            });
        }

        for (i, yi) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(i);
            *yi = cols.iter().zip(vals).map(|(&j, &v)| v * x[j]).sum();
        }
        Ok(())
    }

    /// Euclidean norm of the residual `A * x - b`.
    pub fn residual_norm(&self, x: &[f64], b: &[f64]) -> Result<f64> {
        if b.len() != self.nrows {
            return Err(Error::DimensionMismatch {
                expected: self.nrows,
                actual: b.len(),
                context: "residual rhs".into(),
            });
        }
        let ax = self.mul_vec(x)?;
        Ok(ax
            .iter()
            .zip(b)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt())
    }

    /// Expand to a dense nalgebra matrix. Duplicate entries are summed.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                dense[(i, j)] += v;
            }
        }
        dense
    }

    /// Check numeric symmetry, `|a_ij - a_ji| <= tol` for every stored entry.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                *entries.entry((i, j)).or_insert(0.0) += v;
            }
        }
        entries.iter().all(|(&(i, j), &v)| {
            let mirrored = entries.get(&(j, i)).copied().unwrap_or(0.0);
            (v - mirrored).abs() <= tol
        })
    }
}

/// Borrowed CSR sparsity pattern (values ignored).
#[derive(Debug, Clone, Copy)]
pub struct CsrPattern<'a> {
    nrows: usize,
    ncols: usize,
    row_ptr: &'a [usize],
    col_idx: &'a [usize],
}

impl<'a> CsrPattern<'a> {
    /// Wrap raw structure arrays, checking the CSR invariants.
    pub fn try_new(
        nrows: usize,
        ncols: usize,
        row_ptr: &'a [usize],
        col_idx: &'a [usize],
    ) -> Result<Self> {
        validate::validate_csr_parts(nrows, ncols, row_ptr, col_idx, col_idx.len())?;
        Ok(Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    pub fn row_ptr(&self) -> &'a [usize] {
        self.row_ptr
    }

    pub fn col_idx(&self) -> &'a [usize] {
        self.col_idx
    }

    /// Column indices of row `i`.
    pub fn row(&self, i: usize) -> &'a [usize] {
        &self.col_idx[self.row_ptr[i]..self.row_ptr[i + 1]]
    }

    pub fn has_sorted_rows(&self) -> bool {
        (0..self.nrows).all(|i| self.row(i).windows(2).all(|w| w[0] < w[1]))
    }

    /// Maximum `|i - j|` over stored entries.
    pub fn bandwidth(&self) -> usize {
        (0..self.nrows)
            .flat_map(|i| self.row(i).iter().map(move |&j| i.abs_diff(j)))
            .max()
            .unwrap_or(0)
    }

    /// Envelope size: sum over rows of the distance from the first stored
    /// column left of the diagonal to the diagonal.
    pub fn profile(&self) -> usize {
        (0..self.nrows)
            .map(|i| {
                self.row(i)
                    .iter()
                    .filter(|&&j| j < i)
                    .map(|&j| i - j)
                    .max()
                    .unwrap_or(0)
            })
            .sum()
    }

    /// True if every stored `(i, j)` has a stored `(j, i)`.
    pub fn is_structurally_symmetric(&self) -> bool {
        if !self.is_square() {
            return false;
        }
        (0..self.nrows).all(|i| self.row(i).iter().all(|&j| self.row(j).contains(&i)))
    }

    /// Hash of the structure, used to detect a repeated pattern.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.nrows.hash(&mut hasher);
        self.ncols.hash(&mut hasher);
        self.row_ptr.hash(&mut hasher);
        self.col_idx.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiagonal(n: usize) -> CsrMatrix {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 4.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_triplets(n, n, &triplets).unwrap()
    }

    #[test]
    fn test_from_triplets() {
        let triplets = vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)];

        let m = CsrMatrix::from_triplets(2, 2, &triplets).unwrap();

        assert_eq!(m.nrows(), 2);
        assert_eq!(m.nnz(), 4);
        assert_eq!(m.row_ptr(), &[0, 2, 4]);
        assert_eq!(m.col_idx(), &[0, 1, 0, 1]);
        assert_eq!(m.values(), &[4.0, 1.0, 1.0, 3.0]);
    }

    #[test]
    fn test_from_triplets_duplicates_summed() {
        let triplets = vec![(0, 0, 2.0), (0, 0, 3.0), (1, 1, 1.0)];

        let m = CsrMatrix::from_triplets(2, 2, &triplets).unwrap();

        assert_eq!(m.nnz(), 2);
        assert_eq!(m.values()[0], 5.0);
    }

    #[test]
    fn test_from_triplets_empty_rows() {
        let m = CsrMatrix::from_triplets(4, 4, &[(2, 2, 1.0)]).unwrap();
        assert_eq!(m.row_ptr(), &[0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_from_triplets_out_of_range() {
        let result = CsrMatrix::from_triplets(2, 2, &[(2, 0, 1.0)]);
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_try_new_rejects_bad_row_ptr() {
        let result = CsrMatrix::try_new(2, 2, vec![0, 2, 1], vec![0, 1], vec![1.0, 1.0]);
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_mul_vec() {
        let m = tridiagonal(3);
        let y = m.mul_vec(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(y, vec![3.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mul_vec_dimension_mismatch() {
        let m = tridiagonal(3);
        assert!(matches!(
            m.mul_vec(&[1.0, 1.0]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_to_dense_matches_entries() {
        let m = tridiagonal(3);
        let d = m.to_dense();
        assert_eq!(d[(0, 0)], 4.0);
        assert_eq!(d[(0, 1)], -1.0);
        assert_eq!(d[(0, 2)], 0.0);
    }

    #[test]
    fn test_pattern_metrics() {
        let m = tridiagonal(5);
        let p = m.pattern();
        assert_eq!(p.bandwidth(), 1);
        assert_eq!(p.profile(), 4);
        assert!(p.is_structurally_symmetric());
        assert!(p.has_sorted_rows());
        assert!(m.is_symmetric(0.0));
    }

    #[test]
    fn test_fingerprint_ignores_values() {
        let a = tridiagonal(4);
        let mut b = a.clone();
        b.values_mut()[0] = 10.0;
        assert_eq!(a.pattern().fingerprint(), b.pattern().fingerprint());
        assert_ne!(a.pattern().fingerprint(), tridiagonal(5).pattern().fingerprint());
    }

    #[test]
    fn test_identity() {
        let id = CsrMatrix::identity(3);
        assert_eq!(id.mul_vec(&[1.0, 2.0, 3.0]).unwrap(), vec![1.0, 2.0, 3.0]);
    }
}
