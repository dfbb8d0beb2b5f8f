//! Applying symmetric permutations to matrices and vectors.
//!
//! For a permutation with `order` and `inverse`:
//!
//! - matrix: output row `i` is input row `order[i]`, each column `j` becomes
//!   `inverse[j]`, and every output row is sorted by column
//! - vector: `out[i] = v[order[i]]`
//! - inverse vector: `out[i] = v[inverse[i]]`
//!
//! so `unpermute_vector(permute_vector(v, p), p) == v`.

use rayon::prelude::*;

use crate::csr::CsrMatrix;
use crate::error::{Error, Result};
use crate::permutation::Permutation;
use crate::validate;

/// Matrices with at least this many rows are permuted in parallel.
pub const PARALLEL_PERMUTE_THRESHOLD: usize = 4096;

/// Compute `P A P^T` with sorted columns in every row.
pub fn permute_matrix(matrix: &CsrMatrix, perm: &Permutation) -> Result<CsrMatrix> {
    permute_matrix_with_threshold(matrix, perm, PARALLEL_PERMUTE_THRESHOLD)
}

/// [`permute_matrix`] with an explicit parallelism threshold.
///
/// Rows are gathered one by one when the matrix has fewer than
/// `parallel_threshold` rows, and with rayon otherwise.
pub fn permute_matrix_with_threshold(
    matrix: &CsrMatrix,
    perm: &Permutation,
    parallel_threshold: usize,
) -> Result<CsrMatrix> {
    validate::ensure_square(matrix.nrows(), matrix.ncols())?;
    validate::ensure_permutation_len(matrix.nrows(), perm)?;

    let n = matrix.nrows();
    let order = perm.order();
    let inverse = perm.inverse();

    let mut row_ptr = Vec::with_capacity(n + 1);
    row_ptr.push(0);
    let mut acc = 0;
    for &src in order {
        acc += matrix.row_ptr()[src + 1] - matrix.row_ptr()[src];
        row_ptr.push(acc);
    }

    let gather_row = |new_row: usize| -> Vec<(usize, f64)> {
        let (cols, vals) = matrix.row(order[new_row]);
        let mut entries: Vec<(usize, f64)> = cols
            .iter()
            .zip(vals)
            .map(|(&j, &v)| (inverse[j], v))
            .collect();
        entries.sort_by_key(|&(j, _)| j);
        entries
    };

    let rows: Vec<Vec<(usize, f64)>> = if n >= parallel_threshold {
        (0..n).into_par_iter().map(gather_row).collect()
    } else {
        (0..n).map(gather_row).collect()
    };

    let mut col_idx = Vec::with_capacity(matrix.nnz());
    let mut values = Vec::with_capacity(matrix.nnz());
    for row in rows {
        for (j, v) in row {
            col_idx.push(j);
            values.push(v);
        }
    }

    Ok(CsrMatrix::from_parts_unchecked(
        n, n, row_ptr, col_idx, values,
    ))
}

/// `out[i] = v[order[i]]`.
pub fn permute_vector(v: &[f64], perm: &Permutation) -> Result<Vec<f64>> {
    let mut out = vec![0.0; v.len()];
    permute_vector_into(v, perm, &mut out)?;
    Ok(out)
}

/// `out[i] = v[inverse[i]]`, undoing [`permute_vector`].
pub fn unpermute_vector(v: &[f64], perm: &Permutation) -> Result<Vec<f64>> {
    let mut out = vec![0.0; v.len()];
    unpermute_vector_into(v, perm, &mut out)?;
    Ok(out)
}

pub fn permute_vector_into(v: &[f64], perm: &Permutation, out: &mut [f64]) -> Result<()> {
    gather_into(v, perm.order(), out)
}

pub fn unpermute_vector_into(v: &[f64], perm: &Permutation, out: &mut [f64]) -> Result<()> {
    gather_into(v, perm.inverse(), out)
}

fn gather_into(v: &[f64], index: &[usize], out: &mut [f64]) -> Result<()> {
    if index.len() != v.len() {
        return Err(Error::DimensionMismatch {
            expected: v.len(),
            actual: index.len(),
            context: "permutation length".into(),
        });
    }
    if out.len() != v.len() {
        return Err(Error::DimensionMismatch {
            expected: v.len(),
            actual: out.len(),
            context: "permuted vector output".into(),
        });
    }
    for (o, &src) in out.iter_mut().zip(index) {
        *o = v[src];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Arrowhead: dense first row/column plus the diagonal.
    fn arrowhead(n: usize) -> CsrMatrix {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, (n + i) as f64));
            if i > 0 {
                triplets.push((0, i, 1.0 + i as f64));
                triplets.push((i, 0, 1.0 + i as f64));
            }
        }
        CsrMatrix::from_triplets(n, n, &triplets).unwrap()
    }

    #[test]
    fn test_vector_round_trip() {
        let perm = Permutation::from_order(vec![3, 0, 2, 1]).unwrap();
        let v = vec![10.0, 20.0, 30.0, 40.0];
        let p = permute_vector(&v, &perm).unwrap();
        assert_eq!(p, vec![40.0, 10.0, 30.0, 20.0]);
        assert_eq!(unpermute_vector(&p, &perm).unwrap(), v);
    }

    #[test]
    fn test_matrix_entries_follow_permutation() {
        let a = arrowhead(4);
        let perm = Permutation::from_order(vec![3, 2, 1, 0]).unwrap();
        let pa = permute_matrix(&a, &perm).unwrap();

        assert!(pa.has_sorted_rows());
        assert_eq!(pa.nnz(), a.nnz());

        let dense_a = a.to_dense();
        let dense_pa = pa.to_dense();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(dense_pa[(i, j)], dense_a[(perm.order()[i], perm.order()[j])]);
            }
        }
    }

    #[test]
    fn test_unsorted_input_rows_come_out_sorted() {
        let a = CsrMatrix::try_new(
            2,
            2,
            vec![0, 2, 4],
            vec![1, 0, 1, 0],
            vec![-1.0, 2.0, 2.0, -1.0],
        )
        .unwrap();
        let pa = permute_matrix(&a, &Permutation::identity(2)).unwrap();
        assert_eq!(pa.col_idx(), &[0, 1, 0, 1]);
        assert_eq!(pa.values(), &[2.0, -1.0, -1.0, 2.0]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let a = arrowhead(64);
        let order: Vec<usize> = (0..64).map(|i| (i * 17) % 64).collect();
        let perm = Permutation::from_order(order).unwrap();
        let seq = permute_matrix_with_threshold(&a, &perm, usize::MAX).unwrap();
        let par = permute_matrix_with_threshold(&a, &perm, 1).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_spmv_commutes_with_permutation() {
        let a = arrowhead(5);
        let perm = Permutation::from_order(vec![2, 4, 0, 1, 3]).unwrap();
        let x = vec![1.0, -2.0, 3.0, 0.5, 4.0];

        let ax = a.mul_vec(&x).unwrap();
        let pa = permute_matrix(&a, &perm).unwrap();
        let px = permute_vector(&x, &perm).unwrap();
        let pax = pa.mul_vec(&px).unwrap();

        let expected = permute_vector(&ax, &perm).unwrap();
        for (got, want) in pax.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_length_mismatch() {
        let perm = Permutation::identity(3);
        assert!(matches!(
            permute_vector(&[1.0, 2.0], &perm),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            permute_matrix(&arrowhead(4), &perm),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
