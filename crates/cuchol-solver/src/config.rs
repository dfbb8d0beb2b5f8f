//! Solver session configuration.

use cuchol_core::OrderingMethod;
use cuchol_core::permute::PARALLEL_PERMUTE_THRESHOLD;

/// Configuration for a [`SolverSession`](crate::SolverSession).
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Ordering used when a solve asks for reordering.
    pub ordering: OrderingMethod,
    /// Matrices with at least this many rows are permuted with rayon.
    pub parallel_permute_threshold: usize,
    /// Skip symbolic analysis when the sparsity pattern matches the last
    /// analyzed one.
    pub reuse_symbolic: bool,
    /// Reject matrices whose pattern is not structurally symmetric.
    pub check_symmetry: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            ordering: OrderingMethod::ReverseCuthillMcKee,
            parallel_permute_threshold: PARALLEL_PERMUTE_THRESHOLD,
            reuse_symbolic: true,
            check_symmetry: false,
        }
    }
}

impl SolverConfig {
    /// Use a specific ordering method.
    pub fn with_ordering(mut self, ordering: OrderingMethod) -> Self {
        self.ordering = ordering;
        self
    }

    /// Set the row count above which permutation runs in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_permute_threshold = threshold;
        self
    }

    /// Always redo symbolic analysis.
    pub fn without_symbolic_reuse(mut self) -> Self {
        self.reuse_symbolic = false;
        self
    }

    /// Check structural symmetry before solving.
    pub fn with_symmetry_check(mut self) -> Self {
        self.check_symmetry = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.ordering, OrderingMethod::ReverseCuthillMcKee);
        assert!(config.reuse_symbolic);
        assert!(!config.check_symmetry);
    }

    #[test]
    fn test_builders() {
        let config = SolverConfig::default()
            .with_ordering(OrderingMethod::Natural)
            .with_parallel_threshold(10)
            .without_symbolic_reuse()
            .with_symmetry_check();
        assert_eq!(config.ordering, OrderingMethod::Natural);
        assert_eq!(config.parallel_permute_threshold, 10);
        assert!(!config.reuse_symbolic);
        assert!(config.check_symmetry);
    }
}
