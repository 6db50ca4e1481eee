#![allow(dead_code)]

use dstruct::simulate::{simulate_dag, simulate_linear_sem, simulate_parameter, GraphType};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Structural Hamming distance between two 0/1 patterns: every unordered pair
/// whose edge set differs costs 1, so a reversed edge counts once.
pub fn shd(truth: &DMatrix<f64>, estimate: &DMatrix<f64>) -> usize {
    let d = truth.nrows();
    let mut distance = 0;
    for i in 0..d {
        for j in (i + 1)..d {
            let t = (truth[(i, j)] != 0.0, truth[(j, i)] != 0.0);
            let e = (estimate[(i, j)] != 0.0, estimate[(j, i)] != 0.0);
            if t != e {
                distance += 1;
            }
        }
    }
    distance
}

/// Ground-truth pattern and `n` linear-Gaussian samples from a random ER DAG.
pub fn linear_dataset(d: usize, edges: usize, n: usize, seed: u64) -> (DMatrix<f64>, DMatrix<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let b = simulate_dag(d, edges, GraphType::ErdosRenyi, &mut rng);
    let w = simulate_parameter(&b, &mut rng);
    let x = simulate_linear_sem(&w, n, 1.0, &mut rng).expect("simulated graph is acyclic");
    (b, x)
}

/// Column-centred copy of `x`.
pub fn centred(x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = x.clone();
    for mut col in out.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
    out
}

pub fn assert_zero_diagonal(g: &DMatrix<f64>) {
    for i in 0..g.nrows() {
        assert_eq!(g[(i, i)], 0.0, "diagonal entry {} is non-zero", i);
    }
}
