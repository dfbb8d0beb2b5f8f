//! Input contract checks.
//!
//! Every check is a pure function with no side effects, and each failing
//! check maps to exactly one [`Error`] kind:
//!
//! | check | error |
//! |-------|-------|
//! | CSR structure | [`Error::Format`] |
//! | non-finite values | [`Error::Format`] |
//! | squareness | [`Error::Shape`] |
//! | right-hand side length | [`Error::Shape`] |
//! | permutation length | [`Error::DimensionMismatch`] |

use crate::csr::CsrMatrix;
use crate::error::{Error, Result};
use crate::permutation::Permutation;

/// Check the raw CSR invariants.
pub fn validate_csr_parts(
    nrows: usize,
    ncols: usize,
    row_ptr: &[usize],
    col_idx: &[usize],
    values_len: usize,
) -> Result<()> {
    if row_ptr.len() != nrows + 1 {
        return Err(Error::Format(format!(
            "row_ptr length {} must be nrows + 1 = {}",
            row_ptr.len(),
            nrows + 1
        )));
    }
    if row_ptr[0] != 0 {
        return Err(Error::Format(format!(
            "row_ptr must start at 0, starts at {}",
            row_ptr[0]
        )));
    }
    if let Some(i) = row_ptr.windows(2).position(|w| w[0] > w[1]) {
        return Err(Error::Format(format!(
            "row_ptr decreases between rows {} and {}",
            i,
            i + 1
        )));
    }

    let nnz = row_ptr[nrows];
    if col_idx.len() != nnz {
        return Err(Error::Format(format!(
            "col_idx length {} does not match nnz {}",
            col_idx.len(),
            nnz
        )));
    }
    if values_len != nnz {
        return Err(Error::Format(format!(
            "values length {} does not match nnz {}",
            values_len, nnz
        )));
    }
    if let Some(&col) = col_idx.iter().find(|&&c| c >= ncols) {
        return Err(Error::Format(format!(
            "column index {} out of range for {} columns",
            col, ncols
        )));
    }
    Ok(())
}

/// Check a matrix for the CSR invariants.
pub fn validate_csr(matrix: &CsrMatrix) -> Result<()> {
    validate_csr_parts(
        matrix.nrows(),
        matrix.ncols(),
        matrix.row_ptr(),
        matrix.col_idx(),
        matrix.values().len(),
    )
}

pub fn ensure_square(nrows: usize, ncols: usize) -> Result<()> {
    if nrows != ncols {
        return Err(Error::Shape(format!(
            "matrix must be square, got {}x{}",
            nrows, ncols
        )));
    }
    Ok(())
}

pub fn ensure_rhs_len(n: usize, rhs_len: usize) -> Result<()> {
    if n != rhs_len {
        return Err(Error::Shape(format!(
            "right-hand side has length {}, matrix has {} rows",
            rhs_len, n
        )));
    }
    Ok(())
}

/// Reject NaN and infinite entries.
pub fn ensure_finite(values: &[f64], what: &str) -> Result<()> {
    if let Some(k) = values.iter().position(|v| !v.is_finite()) {
        return Err(Error::Format(format!(
            "{} contains a non-finite value at position {}",
            what, k
        )));
    }
    Ok(())
}

pub fn ensure_permutation_len(n: usize, perm: &Permutation) -> Result<()> {
    if perm.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            actual: perm.len(),
            context: "permutation length".into(),
        });
    }
    Ok(())
}

/// Full pre-dispatch check of a linear system `A x = b`.
///
/// Runs the checks in a fixed order: storage format, squareness, rhs length,
/// finiteness.
pub fn validate_system(matrix: &CsrMatrix, rhs: &[f64]) -> Result<()> {
    validate_csr(matrix)?;
    ensure_square(matrix.nrows(), matrix.ncols())?;
    ensure_rhs_len(matrix.nrows(), rhs.len())?;
    ensure_finite(matrix.values(), "matrix")?;
    ensure_finite(rhs, "right-hand side")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_parts() {
        assert!(validate_csr_parts(2, 2, &[0, 1, 2], &[0, 1], 2).is_ok());
    }

    #[test]
    fn test_row_ptr_wrong_length() {
        let err = validate_csr_parts(3, 3, &[0, 1, 2], &[0, 1], 2).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_row_ptr_nonzero_start() {
        let err = validate_csr_parts(1, 1, &[1, 1], &[], 0).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_values_length_mismatch() {
        let err = validate_csr_parts(2, 2, &[0, 1, 2], &[0, 1], 3).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_column_out_of_range() {
        let err = validate_csr_parts(2, 2, &[0, 1, 2], &[0, 2], 2).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_non_square() {
        assert!(matches!(ensure_square(2, 3), Err(Error::Shape(_))));
        assert!(ensure_square(3, 3).is_ok());
    }

    #[test]
    fn test_rhs_length() {
        assert!(matches!(ensure_rhs_len(4, 3), Err(Error::Shape(_))));
    }

    #[test]
    fn test_non_finite_rhs() {
        let m = CsrMatrix::identity(2);
        let err = validate_system(&m, &[1.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_system_non_square_reported_before_rhs() {
        let m = CsrMatrix::from_triplets(2, 3, &[(0, 0, 1.0)]).unwrap();
        let err = validate_system(&m, &[1.0]).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_permutation_length() {
        let perm = Permutation::identity(3);
        assert!(matches!(
            ensure_permutation_len(4, &perm),
            Err(Error::DimensionMismatch { expected: 4, actual: 3, .. })
        ));
    }
}
