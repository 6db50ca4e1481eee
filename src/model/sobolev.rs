//! Additive structural equations over a truncated Sobolev basis.
//!
//! Each input is expanded into `k` functions `ψ_t(x) = μ_t sin(x / μ_t)` with
//! `μ_t = 2 / ((2t + 1) π)`, and variable `j` is reconstructed by a single
//! linear map over all expanded inputs. As in the MLP model the map is the
//! difference of two non-negative blocks, and weights from `x_j` to itself are
//! pinned at zero.

use std::f64::consts::PI;

use dstruct_optim::Bounds;
use nalgebra::DMatrix;

use super::{Sem, SemFit};

/// Sobolev-basis structural model with `k` basis functions per input.
#[derive(Debug, Clone)]
pub struct NotearsSobolev {
    d: usize,
    k: usize,
    /// `fc1_pos` then `fc1_neg`, each `[d, d·k]` row-major: `j·(d·k) + i·k + t`.
    params: Vec<f64>,
}

impl NotearsSobolev {
    /// Zero-initialised model.
    ///
    /// # Panics
    ///
    /// Panics if `d` or `k` is zero.
    pub fn new(d: usize, k: usize) -> Self {
        assert!(d > 0 && k > 0, "dimension and basis size must be positive");
        NotearsSobolev {
            d,
            k,
            params: vec![0.0; 2 * d * d * k],
        }
    }

    /// Number of basis functions per input.
    pub fn basis_size(&self) -> usize {
        self.k
    }

    fn half(&self) -> usize {
        self.d * self.d * self.k
    }

    /// Effective weight matrix `fc1_pos - fc1_neg`, shape `[d, d·k]`.
    fn weight(&self) -> DMatrix<f64> {
        let dk = self.d * self.k;
        let half = self.half();
        DMatrix::from_fn(self.d, dk, |j, c| {
            self.params[j * dk + c] - self.params[half + j * dk + c]
        })
    }

    /// Basis expansion `[n, d] -> [n, d·k]`, column `i·k + t`.
    pub fn basis(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let k = self.k;
        DMatrix::from_fn(x.nrows(), self.d * k, |s, c| {
            let (i, t) = (c / k, c % k);
            let mu = 2.0 / ((2 * t + 1) as f64) / PI;
            mu * (x[(s, i)] / mu).sin()
        })
    }
}

impl Sem for NotearsSobolev {
    fn dim(&self) -> usize {
        self.d
    }

    fn params(&self) -> &[f64] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f64] {
        &mut self.params
    }

    fn bounds(&self) -> Bounds<f64> {
        let (d, k) = (self.d, self.k);
        let half = self.half();
        let mut bounds = Bounds::unbounded(self.params.len());
        for j in 0..d {
            for i in 0..d {
                let upper = if i == j { 0.0 } else { f64::INFINITY };
                for t in 0..k {
                    let idx = j * d * k + i * k + t;
                    bounds.set(idx, 0.0, upper);
                    bounds.set(half + idx, 0.0, upper);
                }
            }
        }
        bounds
    }

    fn forward(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        self.basis(x) * self.weight().transpose()
    }

    fn fit(&self, x: &DMatrix<f64>, lambda2: f64) -> SemFit {
        let n = x.nrows() as f64;
        let bases = self.basis(x);
        let reconstruction = &bases * self.weight().transpose();

        let residual = &reconstruction - x;
        let squared_loss = 0.5 / n * residual.norm_squared();
        // The L2 term of this family is the mean squared output.
        let l2_reg = reconstruction.norm_squared() / n;

        // ∂/∂x̂ of squared_loss + 0.5·λ2·l2_reg
        let upstream = (residual + &reconstruction * lambda2) / n;
        let g_weight = upstream.transpose() * &bases;

        let dk = self.d * self.k;
        let half = self.half();
        let mut grad = vec![0.0; self.params.len()];
        for j in 0..self.d {
            for c in 0..dk {
                grad[j * dk + c] = g_weight[(j, c)];
                grad[half + j * dk + c] = -g_weight[(j, c)];
            }
        }

        SemFit {
            reconstruction,
            squared_loss,
            l2_reg,
            grad,
        }
    }

    fn fc1_l1_reg(&self) -> f64 {
        self.params.iter().sum()
    }

    fn fc1_l1_backward(&self, scale: f64, grad: &mut [f64]) {
        for g in grad.iter_mut() {
            *g += scale;
        }
    }

    fn squared_adjacency(&self) -> DMatrix<f64> {
        let w = self.weight();
        let k = self.k;
        DMatrix::from_fn(self.d, self.d, |i, j| {
            (0..k).map(|t| w[(j, i * k + t)].powi(2)).sum()
        })
    }

    fn squared_adjacency_backward(&self, upstream: &DMatrix<f64>, grad: &mut [f64]) {
        let w = self.weight();
        let (d, k) = (self.d, self.k);
        let half = self.half();
        for i in 0..d {
            for j in 0..d {
                let u = upstream[(i, j)];
                for t in 0..k {
                    let c = i * k + t;
                    let g = 2.0 * u * w[(j, c)];
                    grad[j * d * k + c] += g;
                    grad[half + j * d * k + c] -= g;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> DMatrix<f64> {
        DMatrix::from_fn(9, 3, |s, i| ((s + 2 * i) as f64 * 0.61).cos())
    }

    #[test]
    fn zero_initialised_model_is_acyclic() {
        let model = NotearsSobolev::new(4, 5);
        assert_eq!(model.squared_adjacency(), DMatrix::zeros(4, 4));
        assert!(model.bounds().is_feasible(model.params()));
    }

    #[test]
    fn basis_matches_closed_form() {
        let model = NotearsSobolev::new(1, 2);
        let x = DMatrix::from_row_slice(1, 1, &[0.3]);
        let b = model.basis(&x);
        let mu0 = 2.0 / PI;
        let mu1 = 2.0 / 3.0 / PI;
        assert!((b[(0, 0)] - mu0 * (0.3 / mu0).sin()).abs() < 1e-15);
        assert!((b[(0, 1)] - mu1 * (0.3 / mu1).sin()).abs() < 1e-15);
    }

    #[test]
    fn fit_gradient_matches_finite_differences() {
        let x = batch();
        let lambda2 = 0.2;
        let mut model = NotearsSobolev::new(3, 2);
        for (k, p) in model.params_mut().iter_mut().enumerate() {
            *p = 0.1 + 0.03 * (k % 5) as f64;
        }
        let objective = |m: &NotearsSobolev| {
            let fit = m.fit(&x, lambda2);
            fit.squared_loss + 0.5 * lambda2 * fit.l2_reg
        };
        let analytic = model.fit(&x, lambda2).grad;

        let eps = 1e-6;
        for k in 0..model.params().len() {
            let mut plus = model.clone();
            let mut minus = model.clone();
            plus.params_mut()[k] += eps;
            minus.params_mut()[k] -= eps;
            let fd = (objective(&plus) - objective(&minus)) / (2.0 * eps);
            assert!(
                (fd - analytic[k]).abs() < 1e-6 * (1.0 + fd.abs()),
                "param {}: fd = {}, analytic = {}",
                k,
                fd,
                analytic[k]
            );
        }
    }
}
