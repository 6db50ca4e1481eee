//! Splitting a batch into the `K` subsets fed to ensemble members.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Produces the per-member subsets of a batch.
///
/// Called once per training step; randomized strategies may return a different
/// split every call.
pub trait PartitionStrategy {
    fn split(&mut self, x: &DMatrix<f64>, k: usize) -> Vec<DMatrix<f64>>;
}

fn gather(x: &DMatrix<f64>, rows: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), x.ncols(), |r, c| x[(rows[r], c)])
}

/// Row ranges of `k` contiguous blocks over `n` rows, sizes differing by at most one.
fn blocks(n: usize, k: usize) -> impl Iterator<Item = (usize, usize)> {
    let base = n / k;
    let extra = n % k;
    (0..k).scan(0, move |start, i| {
        let len = base + usize::from(i < extra);
        let range = (*start, len);
        *start += len;
        Some(range)
    })
}

/// `k` consecutive row blocks, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contiguous;

impl PartitionStrategy for Contiguous {
    fn split(&mut self, x: &DMatrix<f64>, k: usize) -> Vec<DMatrix<f64>> {
        blocks(x.nrows(), k)
            .map(|(start, len)| x.rows(start, len).into_owned())
            .collect()
    }
}

/// A fresh seeded permutation per call, cut into disjoint blocks.
#[derive(Debug, Clone)]
pub struct Shuffled {
    rng: StdRng,
}

impl Shuffled {
    pub fn new(seed: u64) -> Self {
        Shuffled {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PartitionStrategy for Shuffled {
    fn split(&mut self, x: &DMatrix<f64>, k: usize) -> Vec<DMatrix<f64>> {
        let mut order: Vec<usize> = (0..x.nrows()).collect();
        order.shuffle(&mut self.rng);
        blocks(order.len(), k)
            .map(|(start, len)| gather(x, &order[start..start + len]))
            .collect()
    }
}

/// Independent resamples with replacement, `fraction · n` rows each.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    rng: StdRng,
    fraction: f64,
}

impl Bootstrap {
    /// Subsets hold `round(fraction · n)` rows, at least one and at most `n`.
    pub fn new(seed: u64, fraction: f64) -> Self {
        Bootstrap {
            rng: StdRng::seed_from_u64(seed),
            fraction,
        }
    }
}

impl PartitionStrategy for Bootstrap {
    fn split(&mut self, x: &DMatrix<f64>, k: usize) -> Vec<DMatrix<f64>> {
        let n = x.nrows();
        if n == 0 {
            return vec![DMatrix::zeros(0, x.ncols()); k];
        }
        let size = ((self.fraction * n as f64).round() as usize).clamp(1, n);
        (0..k)
            .map(|_| {
                let rows: Vec<usize> = (0..size).map(|_| self.rng.gen_range(0..n)).collect();
                gather(x, &rows)
            })
            .collect()
    }
}
