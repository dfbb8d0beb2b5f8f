//! Symmetric permutations of the index space `[0, n)`.

use crate::error::{Error, Result};

/// A bijection on `[0, n)` stored together with its inverse.
///
/// - `order[k]` is the original index placed at new position `k`
/// - `inverse[i]` is the new position of original index `i`
///
/// so `inverse[order[k]] == k` for every `k`. A permutation is only meaningful
/// for the sparsity pattern it was computed from; callers that solve many
/// systems with one pattern can keep it and pass it back in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    order: Vec<usize>,
    inverse: Vec<usize>,
}

impl Permutation {
    /// Build from an order vector, checking that it is a bijection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if an index is out of range or repeated.
    pub fn from_order(order: Vec<usize>) -> Result<Self> {
        let n = order.len();
        let mut inverse = vec![usize::MAX; n];
        for (k, &i) in order.iter().enumerate() {
            if i >= n {
                return Err(Error::Format(format!(
                    "permutation entry {} out of range for length {}",
                    i, n
                )));
            }
            if inverse[i] != usize::MAX {
                return Err(Error::Format(format!(
                    "permutation repeats index {}",
                    i
                )));
            }
            inverse[i] = k;
        }
        Ok(Self { order, inverse })
    }

    pub fn identity(n: usize) -> Self {
        Self {
            order: (0..n).collect(),
            inverse: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `order[k]` = original index at new position `k`.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// `inverse[i]` = new position of original index `i`.
    pub fn inverse(&self) -> &[usize] {
        &self.inverse
    }

    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(k, &i)| k == i)
    }

    /// The inverse permutation as a permutation of its own.
    pub fn inverted(&self) -> Self {
        Self {
            order: self.inverse.clone(),
            inverse: self.order.clone(),
        }
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<usize>) {
        (self.order, self.inverse)
    }
}
