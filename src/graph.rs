//! Post-processing of weighted adjacency matrices into directed graphs.
//!
//! Convention throughout: `w[(i, j)] != 0` is the edge `i -> j`.

use nalgebra::DMatrix;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

/// Sign rule of the single-model learner.
///
/// Entries with `|w| < threshold` become zero, surviving positive entries
/// become exactly 1, surviving negative entries keep their value. The diagonal
/// is always zero.
pub fn binarize_sign(w: &DMatrix<f64>, threshold: f64) -> DMatrix<f64> {
    DMatrix::from_fn(w.nrows(), w.ncols(), |i, j| {
        let v = w[(i, j)];
        if i == j || v.abs() < threshold {
            0.0
        } else if v > 0.0 {
            1.0
        } else {
            v
        }
    })
}

/// Magnitude rule of the ensemble: `|w| > threshold` gives 1, anything else 0.
/// The diagonal is always zero.
pub fn binarize_magnitude(w: &DMatrix<f64>, threshold: f64) -> DMatrix<f64> {
    DMatrix::from_fn(w.nrows(), w.ncols(), |i, j| {
        if i != j && w[(i, j)].abs() > threshold {
            1.0
        } else {
            0.0
        }
    })
}

/// Directed graph on the non-zero pattern of `w`, edge weights copied over.
pub fn to_digraph(w: &DMatrix<f64>) -> DiGraph<usize, f64> {
    let d = w.nrows();
    let mut graph = DiGraph::with_capacity(d, d);
    let nodes: Vec<NodeIndex> = (0..d).map(|i| graph.add_node(i)).collect();
    for i in 0..d {
        for j in 0..w.ncols().min(d) {
            let v = w[(i, j)];
            if v != 0.0 {
                graph.add_edge(nodes[i], nodes[j], v);
            }
        }
    }
    graph
}

/// Whether the non-zero pattern of `w` is acyclic. Self-loops count as cycles.
pub fn is_dag(w: &DMatrix<f64>) -> bool {
    !is_cyclic_directed(&to_digraph(w))
}

/// A topological order of the non-zero pattern of `w`, or `None` if it has a cycle.
pub fn topological_order(w: &DMatrix<f64>) -> Option<Vec<usize>> {
    let graph = to_digraph(w);
    toposort(&graph, None)
        .ok()
        .map(|order| order.into_iter().map(|n| graph[n]).collect())
}

/// Number of thresholds scanned by [`first_dag_threshold`].
pub const THRESHOLD_STEPS: usize = 100;

/// Scan `THRESHOLD_STEPS` evenly spaced thresholds over `[0, 1]` and return
/// the first one whose magnitude-binarized graph is acyclic, with that graph.
pub fn first_dag_threshold(w: &DMatrix<f64>) -> Option<(f64, DMatrix<f64>)> {
    (0..THRESHOLD_STEPS)
        .map(|s| s as f64 / (THRESHOLD_STEPS - 1) as f64)
        .map(|t| (t, binarize_magnitude(w, t)))
        .find(|(_, g)| is_dag(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            3,
            3,
            &[
                0.9, 0.5, -0.7, //
                0.1, 0.0, 0.4, //
                0.2, -0.35, 0.0,
            ],
        )
    }

    #[test]
    fn sign_rule_keeps_negative_survivors() {
        let g = binarize_sign(&weights(), 0.3);
        let expected = DMatrix::from_row_slice(
            3,
            3,
            &[
                0.0, 1.0, -0.7, //
                0.0, 0.0, 1.0, //
                0.0, -0.35, 0.0,
            ],
        );
        assert_eq!(g, expected);
    }

    #[test]
    fn magnitude_rule_is_symmetric_in_sign() {
        let g = binarize_magnitude(&weights(), 0.3);
        let expected = DMatrix::from_row_slice(
            3,
            3,
            &[
                0.0, 1.0, 1.0, //
                0.0, 0.0, 1.0, //
                0.0, 1.0, 0.0,
            ],
        );
        assert_eq!(g, expected);
    }

    #[test]
    fn binarized_diagonal_is_zero_for_every_threshold() {
        let w = DMatrix::from_element(4, 4, 0.8);
        for s in 0..=10 {
            let t = s as f64 / 10.0;
            let sign = binarize_sign(&w, t);
            let mag = binarize_magnitude(&w, t);
            for i in 0..4 {
                assert_eq!(sign[(i, i)], 0.0);
                assert_eq!(mag[(i, i)], 0.0);
            }
        }
    }

    #[test]
    fn detects_cycles() {
        let mut w = DMatrix::zeros(3, 3);
        w[(0, 1)] = 1.0;
        w[(1, 2)] = 1.0;
        assert!(is_dag(&w));
        assert_eq!(topological_order(&w), Some(vec![0, 1, 2]));
        w[(2, 0)] = 1.0;
        assert!(!is_dag(&w));
        assert_eq!(topological_order(&w), None);
    }

    #[test]
    fn first_dag_threshold_breaks_weakest_cycle_edge() {
        let mut w = DMatrix::zeros(3, 3);
        w[(0, 1)] = 0.9;
        w[(1, 2)] = 0.8;
        w[(2, 0)] = 0.25;
        let (t, g) = first_dag_threshold(&w).unwrap();
        assert!(t >= 0.25 && t < 0.8);
        assert!(is_dag(&g));
        assert_eq!(g[(0, 1)], 1.0);
        assert_eq!(g[(2, 0)], 0.0);
    }
}
