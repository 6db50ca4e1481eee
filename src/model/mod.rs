//! Structural models: differentiable reconstructions with an acyclicity measure.
//!
//! A [`StructuralModel`] wraps one of the structural equation families in
//! [`SemModel`] together with its regularization weights, and evaluates the
//! augmented objective
//!
//! ```text
//! 0.5/n ‖x̂ − x‖² + 0.5·ρ·h² + α·h + 0.5·λ2·l2 + λ1·l1
//! ```
//!
//! with `(ρ, α)` borrowed from a [`DualAscentState`] owned by the caller.

pub mod acyclicity;
pub mod mlp;
pub mod sobolev;

use dstruct_optim::Bounds;
use nalgebra::DMatrix;

use crate::config::{ModelConfig, SemType};
use crate::dual_ascent::DualAscentState;
use crate::error::ConfigError;

pub use acyclicity::{acyclicity, acyclicity_with_gradient};
pub use mlp::NotearsMlp;
pub use sobolev::NotearsSobolev;

/// Reconstruction fit of a structural equation family on one batch.
#[derive(Debug, Clone)]
pub struct SemFit {
    /// `x̂`, same shape as the batch.
    pub reconstruction: DMatrix<f64>,
    /// `0.5/n ‖x̂ − x‖²`.
    pub squared_loss: f64,
    /// The family's L2 regularizer (unweighted).
    pub l2_reg: f64,
    /// Gradient of `squared_loss + 0.5·λ2·l2_reg` with respect to the parameters.
    pub grad: Vec<f64>,
}

/// Capabilities shared by the structural equation families.
///
/// Adjacency is exposed in squared form, `A[i][j] = Σ w²` over every first
/// layer weight reading `x_i` into the equation of `x_j`.
pub trait Sem {
    /// Number of observed variables.
    fn dim(&self) -> usize;

    /// Flat parameter vector.
    fn params(&self) -> &[f64];

    fn params_mut(&mut self) -> &mut [f64];

    /// Box constraints: non-negative split weights, self-loops pinned to zero.
    fn bounds(&self) -> Bounds<f64>;

    /// Reconstruction `x̂` of an `[n, d]` batch.
    fn forward(&self, x: &DMatrix<f64>) -> DMatrix<f64>;

    /// Reconstruction loss, L2 term and their gradient.
    fn fit(&self, x: &DMatrix<f64>, lambda2: f64) -> SemFit;

    /// `Σ (fc1_pos + fc1_neg)`; equals the L1 norm of the effective weights at a minimum.
    fn fc1_l1_reg(&self) -> f64;

    /// Accumulate `∂/∂θ (scale · fc1_l1_reg)`.
    fn fc1_l1_backward(&self, scale: f64, grad: &mut [f64]);

    fn squared_adjacency(&self) -> DMatrix<f64>;

    /// Accumulate `∂/∂θ Σ upstream ∘ A`.
    fn squared_adjacency_backward(&self, upstream: &DMatrix<f64>, grad: &mut [f64]);
}

/// Structural equation family, chosen once at construction.
#[derive(Debug, Clone)]
pub enum SemModel {
    Mlp(NotearsMlp),
    Sobolev(NotearsSobolev),
}

macro_rules! dispatch {
    ($self:ident, $m:ident => $body:expr) => {
        match $self {
            SemModel::Mlp($m) => $body,
            SemModel::Sobolev($m) => $body,
        }
    };
}

impl SemModel {
    /// Build the family named by `config.sem_type`.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(match config.sem_type {
            SemType::Mlp => SemModel::Mlp(NotearsMlp::new(&config.architecture(), config.seed)),
            SemType::Sobolev => {
                SemModel::Sobolev(NotearsSobolev::new(config.dim, config.sobolev_basis))
            }
        })
    }

    pub fn sem_type(&self) -> SemType {
        match self {
            SemModel::Mlp(_) => SemType::Mlp,
            SemModel::Sobolev(_) => SemType::Sobolev,
        }
    }
}

impl Sem for SemModel {
    fn dim(&self) -> usize {
        dispatch!(self, m => m.dim())
    }

    fn params(&self) -> &[f64] {
        dispatch!(self, m => m.params())
    }

    fn params_mut(&mut self) -> &mut [f64] {
        dispatch!(self, m => m.params_mut())
    }

    fn bounds(&self) -> Bounds<f64> {
        dispatch!(self, m => m.bounds())
    }

    fn forward(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        dispatch!(self, m => m.forward(x))
    }

    fn fit(&self, x: &DMatrix<f64>, lambda2: f64) -> SemFit {
        dispatch!(self, m => m.fit(x, lambda2))
    }

    fn fc1_l1_reg(&self) -> f64 {
        dispatch!(self, m => m.fc1_l1_reg())
    }

    fn fc1_l1_backward(&self, scale: f64, grad: &mut [f64]) {
        dispatch!(self, m => m.fc1_l1_backward(scale, grad))
    }

    fn squared_adjacency(&self) -> DMatrix<f64> {
        dispatch!(self, m => m.squared_adjacency())
    }

    fn squared_adjacency_backward(&self, upstream: &DMatrix<f64>, grad: &mut [f64]) {
        dispatch!(self, m => m.squared_adjacency_backward(upstream, grad))
    }
}

/// Breakdown of one evaluation of the augmented objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossTerms {
    pub squared_loss: f64,
    /// Acyclicity `h` of the current parameters.
    pub h: f64,
    /// `0.5·ρ·h² + α·h`.
    pub penalty: f64,
    /// `0.5·λ2·l2_reg`.
    pub l2: f64,
    /// `λ1·fc1_l1_reg`.
    pub l1: f64,
    pub total: f64,
}

/// A structural model plus its fixed regularization weights.
#[derive(Debug, Clone)]
pub struct StructuralModel {
    sem: SemModel,
    lambda1: f64,
    lambda2: f64,
}

impl StructuralModel {
    /// Validate `config` and build the model it describes.
    pub fn new(config: &ModelConfig) -> Result<Self, ConfigError> {
        Ok(StructuralModel {
            sem: SemModel::from_config(config)?,
            lambda1: config.lambda1,
            lambda2: config.lambda2,
        })
    }

    /// Wrap an already constructed family.
    pub fn from_sem(sem: SemModel, lambda1: f64, lambda2: f64) -> Self {
        StructuralModel {
            sem,
            lambda1,
            lambda2,
        }
    }

    pub fn dim(&self) -> usize {
        self.sem.dim()
    }

    pub fn sem(&self) -> &SemModel {
        &self.sem
    }

    pub fn sem_type(&self) -> SemType {
        self.sem.sem_type()
    }

    pub fn lambda1(&self) -> f64 {
        self.lambda1
    }

    pub fn lambda2(&self) -> f64 {
        self.lambda2
    }

    pub fn params(&self) -> &[f64] {
        self.sem.params()
    }

    /// Overwrite the parameters.
    ///
    /// # Panics
    ///
    /// Panics if `params` has the wrong length.
    pub fn set_params(&mut self, params: &[f64]) {
        self.sem.params_mut().copy_from_slice(params);
    }

    pub fn bounds(&self) -> Bounds<f64> {
        self.sem.bounds()
    }

    /// Reconstruction and augmented loss on `x` under the penalty `state`.
    pub fn forward(
        &self,
        x: &DMatrix<f64>,
        state: &DualAscentState,
    ) -> (DMatrix<f64>, LossTerms) {
        let fit = self.sem.fit(x, self.lambda2);
        let terms = self.terms(&fit, self.acyclicity(), state);
        (fit.reconstruction, terms)
    }

    /// Augmented loss and its gradient with respect to [`Self::params`].
    pub fn loss_and_gradient(
        &self,
        x: &DMatrix<f64>,
        state: &DualAscentState,
    ) -> (LossTerms, Vec<f64>) {
        let fit = self.sem.fit(x, self.lambda2);
        let (h, grad_h) = acyclicity_with_gradient(&self.sem.squared_adjacency());
        let terms = self.terms(&fit, h, state);

        let mut grad = fit.grad;
        let coeff = state.rho * h + state.alpha;
        self.sem.squared_adjacency_backward(&(grad_h * coeff), &mut grad);
        if self.lambda1 > 0.0 {
            self.sem.fc1_l1_backward(self.lambda1, &mut grad);
        }
        (terms, grad)
    }

    fn terms(&self, fit: &SemFit, h: f64, state: &DualAscentState) -> LossTerms {
        let penalty = 0.5 * state.rho * h * h + state.alpha * h;
        let l2 = 0.5 * self.lambda2 * fit.l2_reg;
        let l1 = self.lambda1 * self.sem.fc1_l1_reg();
        LossTerms {
            squared_loss: fit.squared_loss,
            h,
            penalty,
            l2,
            l1,
            total: fit.squared_loss + penalty + l2 + l1,
        }
    }

    /// Acyclicity `h`, independent of `ρ` and `α`; never negative.
    pub fn acyclicity(&self) -> f64 {
        acyclicity(&self.sem.squared_adjacency())
    }

    /// Weighted adjacency `W = √A` with a zero diagonal; `W[i][j]` is the
    /// strength of `x_i -> x_j`.
    pub fn weighted_adjacency(&self) -> DMatrix<f64> {
        let mut w = self.sem.squared_adjacency().map(f64::sqrt);
        w.fill_diagonal(0.0);
        w
    }

    /// Pull an upstream gradient on [`Self::weighted_adjacency`] back onto the
    /// parameters, accumulating into `grad`.
    ///
    /// Uses `∂W/∂w = w / W`; entries with `W = 0` and the diagonal contribute nothing.
    pub fn adjacency_vjp(&self, upstream: &DMatrix<f64>, grad: &mut [f64]) {
        let a = self.sem.squared_adjacency();
        let d = a.nrows();
        let scaled = DMatrix::from_fn(d, d, |i, j| {
            let w = a[(i, j)].sqrt();
            if i == j || w <= 0.0 {
                0.0
            } else {
                upstream[(i, j)] / (2.0 * w)
            }
        });
        self.sem.squared_adjacency_backward(&scaled, grad);
    }
}
