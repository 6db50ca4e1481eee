//! Consensus penalty that pulls ensemble members toward a common graph.
//!
//! For adjacencies `A_1..A_K` with elementwise mean `C`, the loss is
//!
//! ```text
//! Σ_k mean_{i,j} (M ∘ (A_k − C))²,   M = 1 − I
//! ```
//!
//! i.e. a masked mean-squared error over all `d²` entries with self-loops
//! excluded.

use nalgebra::DMatrix;

/// `anchor + Σ (a − anchor) / k`: the mean of `anchor` and `rest`, exactly
/// `anchor` when every member of `rest` equals it.
fn anchored_mean(anchor: &DMatrix<f64>, rest: &[DMatrix<f64>]) -> DMatrix<f64> {
    let k = (rest.len() + 1) as f64;
    let mut offset = DMatrix::zeros(anchor.nrows(), anchor.ncols());
    for a in rest {
        offset += a - anchor;
    }
    anchor + offset / k
}

/// Elementwise mean of `adjacencies`, taken relative to the first one.
///
/// # Panics
///
/// Panics if `adjacencies` is empty or the shapes differ.
pub fn consensus_mean(adjacencies: &[DMatrix<f64>]) -> DMatrix<f64> {
    assert!(!adjacencies.is_empty(), "consensus of zero adjacencies");
    anchored_mean(&adjacencies[0], &adjacencies[1..])
}

fn masked_mse(a: &DMatrix<f64>, c: &DMatrix<f64>) -> f64 {
    let d = a.nrows();
    let mut sum = 0.0;
    for j in 0..a.ncols() {
        for i in 0..d {
            if i != j {
                let diff = a[(i, j)] - c[(i, j)];
                sum += diff * diff;
            }
        }
    }
    sum / a.len() as f64
}

/// Unweighted consensus loss; zero for an empty or single-member set.
pub fn consensus_loss(adjacencies: &[DMatrix<f64>]) -> f64 {
    if adjacencies.len() < 2 {
        return 0.0;
    }
    let mean = consensus_mean(adjacencies);
    adjacencies.iter().map(|a| masked_mse(a, &mean)).sum()
}

/// The consensus term seen by one member while the others are held fixed.
#[derive(Debug, Clone)]
pub struct ConsensusTerm {
    /// Adjacencies of the other members, captured before the solve.
    others: Vec<DMatrix<f64>>,
    weight: f64,
}

impl ConsensusTerm {
    /// Snapshot the other members' adjacencies.
    pub fn new(others: Vec<DMatrix<f64>>, weight: f64) -> Self {
        ConsensusTerm { others, weight }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// `weight · loss` at the member's current adjacency, and its gradient
    /// with respect to that adjacency.
    ///
    /// The mean includes `own`. Because the residuals `A_k − C` sum to zero,
    /// the derivative through `C` cancels and the gradient is
    /// `weight · 2/d² · M ∘ (own − C)`.
    pub fn evaluate(&self, own: &DMatrix<f64>) -> (f64, DMatrix<f64>) {
        let (d, _) = own.shape();
        if self.others.is_empty() || self.weight == 0.0 {
            return (0.0, DMatrix::zeros(d, d));
        }
        let mean = anchored_mean(own, &self.others);

        let mut value = masked_mse(own, &mean);
        for a in &self.others {
            value += masked_mse(a, &mean);
        }

        let scale = self.weight * 2.0 / own.len() as f64;
        let mut grad = (own - &mean) * scale;
        grad.fill_diagonal(0.0);
        (self.weight * value, grad)
    }
}
