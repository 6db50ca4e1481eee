//! Synthetic DAGs and linear-Gaussian data for experiments and tests.

use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{DStructError, Result};
use crate::graph::topological_order;

/// Random graph family for [`simulate_dag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GraphType {
    /// Exactly `edges` edges drawn uniformly among acyclic pairs.
    ErdosRenyi,
    /// Preferential attachment, about `edges / d` parents per new node.
    ScaleFree,
}

/// Binary adjacency of a random DAG on `d` nodes.
///
/// Edges are generated along a fixed order and the nodes are then relabelled
/// by a random permutation, so the topological order is not `0..d`.
pub fn simulate_dag<R: Rng + ?Sized>(
    d: usize,
    edges: usize,
    graph_type: GraphType,
    rng: &mut R,
) -> DMatrix<f64> {
    let mut lower = DMatrix::zeros(d, d);
    match graph_type {
        GraphType::ErdosRenyi => {
            let mut pairs: Vec<(usize, usize)> =
                (0..d).flat_map(|j| (0..j).map(move |i| (i, j))).collect();
            pairs.shuffle(rng);
            for &(i, j) in pairs.iter().take(edges) {
                lower[(i, j)] = 1.0;
            }
        }
        GraphType::ScaleFree => {
            let m = (edges as f64 / d.max(1) as f64).round().max(1.0) as usize;
            let mut degree = vec![0usize; d];
            for t in 1..d {
                let mut targets: Vec<usize> = Vec::with_capacity(m);
                while targets.len() < m.min(t) {
                    let total: usize = (0..t)
                        .filter(|s| !targets.contains(s))
                        .map(|s| degree[s] + 1)
                        .sum();
                    let mut pick = rng.gen_range(0..total);
                    for s in (0..t).filter(|s| !targets.contains(s)) {
                        if pick < degree[s] + 1 {
                            targets.push(s);
                            break;
                        }
                        pick -= degree[s] + 1;
                    }
                }
                for s in targets {
                    lower[(s, t)] = 1.0;
                    degree[s] += 1;
                    degree[t] += 1;
                }
            }
        }
    }

    let mut perm: Vec<usize> = (0..d).collect();
    perm.shuffle(rng);
    DMatrix::from_fn(d, d, |i, j| lower[(perm[i], perm[j])])
}

/// Edge weights on the pattern of `b`, uniform in `[-2, -0.5] ∪ [0.5, 2]`.
pub fn simulate_parameter<R: Rng + ?Sized>(b: &DMatrix<f64>, rng: &mut R) -> DMatrix<f64> {
    b.map(|v| {
        if v == 0.0 {
            0.0
        } else {
            let magnitude = rng.gen_range(0.5..2.0);
            if rng.gen_bool(0.5) {
                magnitude
            } else {
                -magnitude
            }
        }
    })
}

/// `n` samples of the linear SEM `X = X·W + noise_scale·Z`, `Z` standard normal.
///
/// Returns [`DStructError::NotADag`] if `w` has a cycle.
pub fn simulate_linear_sem<R: Rng + ?Sized>(
    w: &DMatrix<f64>,
    n: usize,
    noise_scale: f64,
    rng: &mut R,
) -> Result<DMatrix<f64>> {
    let d = w.nrows();
    let order = topological_order(w).ok_or(DStructError::NotADag)?;
    let mut x = DMatrix::zeros(n, d);
    for j in order {
        for s in 0..n {
            let mut value: f64 = (0..d).map(|i| x[(s, i)] * w[(i, j)]).sum();
            let z: f64 = rng.sample(StandardNormal);
            value += noise_scale * z;
            x[(s, j)] = value;
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::is_dag;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn erdos_renyi_has_requested_edges() {
        let mut rng = StdRng::seed_from_u64(0);
        let b = simulate_dag(6, 7, GraphType::ErdosRenyi, &mut rng);
        assert!(is_dag(&b));
        assert_eq!(b.sum(), 7.0);
    }

    #[test]
    fn scale_free_is_acyclic() {
        let mut rng = StdRng::seed_from_u64(1);
        let b = simulate_dag(10, 20, GraphType::ScaleFree, &mut rng);
        assert!(is_dag(&b));
        assert_eq!(b.sum(), 17.0);
    }

    #[test]
    fn parameters_follow_the_pattern() {
        let mut rng = StdRng::seed_from_u64(2);
        let b = simulate_dag(5, 6, GraphType::ErdosRenyi, &mut rng);
        let w = simulate_parameter(&b, &mut rng);
        for (bv, wv) in b.iter().zip(w.iter()) {
            if *bv == 0.0 {
                assert_eq!(*wv, 0.0);
            } else {
                assert!((0.5..2.0).contains(&wv.abs()));
            }
        }
    }

    #[test]
    fn root_columns_are_pure_noise() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut w = DMatrix::zeros(2, 2);
        w[(0, 1)] = 2.0;
        let x = simulate_linear_sem(&w, 500, 0.0, &mut rng).unwrap();
        assert!(x.iter().all(|v| *v == 0.0));

        let x = simulate_linear_sem(&w, 2000, 1.0, &mut rng).unwrap();
        let var0 = x.column(0).iter().map(|v| v * v).sum::<f64>() / 2000.0;
        let var1 = x.column(1).iter().map(|v| v * v).sum::<f64>() / 2000.0;
        assert!((var0 - 1.0).abs() < 0.15);
        assert!((var1 - 5.0).abs() < 0.75);
    }

    #[test]
    fn cyclic_weights_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut w = DMatrix::zeros(2, 2);
        w[(0, 1)] = 1.0;
        w[(1, 0)] = 1.0;
        assert_eq!(
            simulate_linear_sem(&w, 10, 1.0, &mut rng),
            Err(DStructError::NotADag)
        );
    }
}
