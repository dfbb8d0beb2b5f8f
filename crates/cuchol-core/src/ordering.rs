//! Fill-reducing orderings.
//!
//! The default ordering is reverse Cuthill-McKee (RCM), a bandwidth and
//! envelope reducing heuristic that works on the symmetric sparsity pattern
//! only. Numeric values are never read.
//!
//! # Algorithm
//!
//! ```text
//! 1. Symmetrize the pattern: edge (i, j) for every stored (i, j) or (j, i), i != j
//! 2. For each connected component, in order of its smallest original index:
//!    a. Find a pseudo-peripheral start node (George-Liu level structures)
//!    b. Breadth-first search from it, visiting neighbours by ascending
//!       (degree, index)
//!    c. Reverse the visit order of the component
//! 3. Concatenate the component orders
//! ```
//!
//! Every tie is broken by ascending original index, so the result is a pure
//! function of the pattern.

use std::fmt;

use crate::csr::CsrPattern;
use crate::error::Result;
use crate::permutation::Permutation;
use crate::validate;

/// Which ordering to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingMethod {
    /// Reverse Cuthill-McKee (default).
    #[default]
    ReverseCuthillMcKee,
    /// Identity ordering.
    Natural,
}

impl OrderingMethod {
    /// Parse from a name. Accepts `"rcm"`, `"reverse-cuthill-mckee"`,
    /// `"natural"` and `"none"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "rcm" | "reverse-cuthill-mckee" => Some(Self::ReverseCuthillMcKee),
            "natural" | "none" => Some(Self::Natural),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReverseCuthillMcKee => "rcm",
            Self::Natural => "natural",
        }
    }
}

impl fmt::Display for OrderingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Summary of what an ordering did to a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingStats {
    pub bandwidth_before: usize,
    pub bandwidth_after: usize,
    pub components: usize,
}

/// Compute the reverse Cuthill-McKee ordering of a square pattern.
///
/// # Errors
///
/// Returns [`Error::Shape`](crate::Error::Shape) if the pattern is not square.
pub fn compute_ordering(pattern: CsrPattern<'_>) -> Result<Permutation> {
    compute_ordering_with(pattern, OrderingMethod::ReverseCuthillMcKee)
}

/// Compute an ordering with an explicit method.
pub fn compute_ordering_with(pattern: CsrPattern<'_>, method: OrderingMethod) -> Result<Permutation> {
    validate::ensure_square(pattern.nrows(), pattern.ncols())?;

    let perm = match method {
        OrderingMethod::Natural => Permutation::identity(pattern.nrows()),
        OrderingMethod::ReverseCuthillMcKee => {
            let graph = Graph::from_pattern(pattern);
            let (order, components) = reverse_cuthill_mckee(&graph);
            log::debug!(
                "RCM ordering: n={}, nnz={}, {} component(s)",
                pattern.nrows(),
                pattern.nnz(),
                components
            );
            Permutation::from_order(order)?
        }
    };
    Ok(perm)
}

/// Bandwidth of the pattern before and after applying `perm`.
pub fn ordering_stats(pattern: CsrPattern<'_>, perm: &Permutation) -> Result<OrderingStats> {
    validate::ensure_square(pattern.nrows(), pattern.ncols())?;
    validate::ensure_permutation_len(pattern.nrows(), perm)?;

    let inv = perm.inverse();
    let mut bandwidth_after = 0;
    for i in 0..pattern.nrows() {
        for &j in pattern.row(i) {
            bandwidth_after = bandwidth_after.max(inv[i].abs_diff(inv[j]));
        }
    }

    Ok(OrderingStats {
        bandwidth_before: pattern.bandwidth(),
        bandwidth_after,
        components: Graph::from_pattern(pattern).count_components(),
    })
}

/// Symmetrized adjacency structure without self loops.
struct Graph {
    /// Neighbours of each node, sorted by (degree, index).
    adj: Vec<Vec<usize>>,
}

impl Graph {
    fn from_pattern(pattern: CsrPattern<'_>) -> Self {
        let n = pattern.nrows();
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            for &j in pattern.row(i) {
                if i != j {
                    adj[i].push(j);
                    adj[j].push(i);
                }
            }
        }
        for neighbours in adj.iter_mut() {
            neighbours.sort_unstable();
            neighbours.dedup();
        }

        let degree: Vec<usize> = adj.iter().map(Vec::len).collect();
        for neighbours in adj.iter_mut() {
            neighbours.sort_by_key(|&v| (degree[v], v));
        }

        Self { adj }
    }

    fn len(&self) -> usize {
        self.adj.len()
    }

    fn degree(&self, v: usize) -> usize {
        self.adj[v].len()
    }

    fn count_components(&self) -> usize {
        let mut visited = vec![false; self.len()];
        let mut stack = Vec::new();
        let mut components = 0;
        for seed in 0..self.len() {
            if visited[seed] {
                continue;
            }
            components += 1;
            visited[seed] = true;
            stack.push(seed);
            while let Some(v) = stack.pop() {
                for &w in &self.adj[v] {
                    if !visited[w] {
                        visited[w] = true;
                        stack.push(w);
                    }
                }
            }
        }
        components
    }
}

/// Rooted level structure produced by a breadth-first search.
struct LevelStructure {
    nodes: Vec<usize>,
    /// `nodes[level_ptr[l]..level_ptr[l + 1]]` is level `l`.
    level_ptr: Vec<usize>,
}

impl LevelStructure {
    fn depth(&self) -> usize {
        self.level_ptr.len() - 1
    }

    fn last_level(&self) -> &[usize] {
        let d = self.depth();
        &self.nodes[self.level_ptr[d - 1]..self.level_ptr[d]]
    }
}

/// Scratch state shared by the searches of one ordering run.
struct Workspace {
    /// `stamp[v] == epoch` marks `v` as seen by the current level search.
    stamp: Vec<usize>,
    epoch: usize,
}

impl Workspace {
    fn new(n: usize) -> Self {
        Self {
            stamp: vec![0; n],
            epoch: 0,
        }
    }

    fn level_structure(&mut self, graph: &Graph, root: usize) -> LevelStructure {
        self.epoch += 1;
        let epoch = self.epoch;

        let mut nodes = vec![root];
        let mut level_ptr = vec![0, 1];
        self.stamp[root] = epoch;

        let mut start = 0;
        loop {
            let end = nodes.len();
            for idx in start..end {
                let v = nodes[idx];
                for &w in &graph.adj[v] {
                    if self.stamp[w] != epoch {
                        self.stamp[w] = epoch;
                        nodes.push(w);
                    }
                }
            }
            if nodes.len() == end {
                break;
            }
            level_ptr.push(nodes.len());
            start = end;
        }

        LevelStructure { nodes, level_ptr }
    }

    /// George-Liu pseudo-peripheral node search starting from `seed`.
    fn pseudo_peripheral_node(&mut self, graph: &Graph, seed: usize) -> usize {
        let mut root = seed;
        let mut levels = self.level_structure(graph, root);

        loop {
            let candidate = levels
                .last_level()
                .iter()
                .copied()
                .min_by_key(|&v| (graph.degree(v), v))
                .unwrap_or(root);
            if candidate == root {
                return root;
            }

            let candidate_levels = self.level_structure(graph, candidate);
            if candidate_levels.depth() > levels.depth() {
                root = candidate;
                levels = candidate_levels;
            } else {
                return root;
            }
        }
    }
}

/// Returns the RCM order and the number of connected components.
fn reverse_cuthill_mckee(graph: &Graph) -> (Vec<usize>, usize) {
    let n = graph.len();
    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    let mut workspace = Workspace::new(n);
    let mut components = 0;

    for seed in 0..n {
        if visited[seed] {
            continue;
        }
        components += 1;

        let component_start = order.len();
        let start = workspace.pseudo_peripheral_node(graph, seed);

        visited[start] = true;
        order.push(start);
        let mut head = component_start;
        while head < order.len() {
            let v = order[head];
            head += 1;
            for &w in &graph.adj[v] {
                if !visited[w] {
                    visited[w] = true;
                    order.push(w);
                }
            }
        }

        order[component_start..].reverse();
    }

    (order, components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::CsrMatrix;
    use crate::error::Error;

    fn from_edges(n: usize, edges: &[(usize, usize)]) -> CsrMatrix {
        let mut triplets: Vec<(usize, usize, f64)> = (0..n).map(|i| (i, i, 4.0)).collect();
        for &(i, j) in edges {
            triplets.push((i, j, -1.0));
            triplets.push((j, i, -1.0));
        }
        CsrMatrix::from_triplets(n, n, &triplets).unwrap()
    }

    fn assert_valid(perm: &Permutation, n: usize) {
        assert_eq!(perm.len(), n);
        let mut seen = vec![false; n];
        for &i in perm.order() {
            assert!(!seen[i], "index {} appears twice", i);
            seen[i] = true;
        }
        for k in 0..n {
            assert_eq!(perm.inverse()[perm.order()[k]], k);
        }
    }

    #[test]
    fn test_path_graph() {
        // 0 - 1 - 2 - 3 is already banded; RCM starts from an end.
        let m = from_edges(4, &[(0, 1), (1, 2), (2, 3)]);
        let perm = compute_ordering(m.pattern()).unwrap();
        assert_valid(&perm, 4);
        let stats = ordering_stats(m.pattern(), &perm).unwrap();
        assert_eq!(stats.bandwidth_after, 1);
    }

    #[test]
    fn test_reduces_bandwidth_of_shuffled_path() {
        // Path 0 - 4 - 1 - 3 - 2 stored with natural labels has bandwidth 4.
        let m = from_edges(5, &[(0, 4), (4, 1), (1, 3), (3, 2)]);
        let perm = compute_ordering(m.pattern()).unwrap();
        let stats = ordering_stats(m.pattern(), &perm).unwrap();
        assert_eq!(stats.bandwidth_before, 4);
        assert_eq!(stats.bandwidth_after, 1);
        assert_eq!(stats.components, 1);
    }

    #[test]
    fn test_star_graph_centre_last_in_first_component() {
        // Star centred at 0: CM starts from a leaf, so the reversed order ends
        // with that leaf and the centre sits second to last.
        let m = from_edges(4, &[(0, 1), (0, 2), (0, 3)]);
        let perm = compute_ordering(m.pattern()).unwrap();
        assert_valid(&perm, 4);
        assert_eq!(perm.order()[3], 1);
        assert_eq!(perm.order()[2], 0);
    }

    #[test]
    fn test_disconnected_blocks() {
        // Two disjoint 2x2 blocks: {0, 2} and {1, 3}.
        let m = from_edges(4, &[(0, 2), (1, 3)]);
        let perm = compute_ordering(m.pattern()).unwrap();
        assert_valid(&perm, 4);
        // Components concatenated in discovery order: the block holding 0 first.
        let first: Vec<usize> = perm.order()[..2].to_vec();
        assert!(first.contains(&0) && first.contains(&2));
        let stats = ordering_stats(m.pattern(), &perm).unwrap();
        assert_eq!(stats.components, 2);
        assert_eq!(stats.bandwidth_after, 1);
    }

    #[test]
    fn test_isolated_nodes() {
        let m = from_edges(5, &[(1, 3)]);
        let perm = compute_ordering(m.pattern()).unwrap();
        assert_valid(&perm, 5);
        assert_eq!(perm.order()[0], 0);
        let stats = ordering_stats(m.pattern(), &perm).unwrap();
        assert_eq!(stats.components, 4);
    }

    #[test]
    fn test_empty_rows() {
        let m = CsrMatrix::try_new(3, 3, vec![0, 0, 0, 0], vec![], vec![]).unwrap();
        let perm = compute_ordering(m.pattern()).unwrap();
        assert!(perm.is_identity());
    }

    #[test]
    fn test_asymmetric_pattern_is_symmetrized() {
        // Only the upper triangle stored.
        let m = CsrMatrix::from_triplets(
            4,
            4,
            &[(0, 0, 1.0), (0, 3, 1.0), (1, 1, 1.0), (1, 3, 1.0), (2, 2, 1.0), (3, 3, 1.0)],
        )
        .unwrap();
        let upper = compute_ordering(m.pattern()).unwrap();
        let full = from_edges(4, &[(0, 3), (1, 3)]);
        let symmetric = compute_ordering(full.pattern()).unwrap();
        assert_eq!(upper, symmetric);
    }

    #[test]
    fn test_deterministic() {
        let m = from_edges(6, &[(0, 5), (5, 2), (2, 4), (4, 1), (1, 3), (0, 2)]);
        let a = compute_ordering(m.pattern()).unwrap();
        let b = compute_ordering(m.pattern()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_square_rejected() {
        let m = CsrMatrix::from_triplets(2, 3, &[(0, 0, 1.0)]).unwrap();
        assert!(matches!(compute_ordering(m.pattern()), Err(Error::Shape(_))));
    }

    #[test]
    fn test_natural_is_identity() {
        let m = from_edges(3, &[(0, 2)]);
        let perm = compute_ordering_with(m.pattern(), OrderingMethod::Natural).unwrap();
        assert!(perm.is_identity());
    }

    #[test]
    fn test_method_from_name() {
        assert_eq!(
            OrderingMethod::from_name("RCM"),
            Some(OrderingMethod::ReverseCuthillMcKee)
        );
        assert_eq!(OrderingMethod::from_name("none"), Some(OrderingMethod::Natural));
        assert_eq!(OrderingMethod::from_name("metis"), None);
        assert_eq!(OrderingMethod::default().to_string(), "rcm");
    }
}
