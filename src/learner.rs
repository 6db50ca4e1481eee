//! Single-model NOTEARS learner.

use dstruct_optim::{lbfgsb, LbfgsbConfig, Objective};
use nalgebra::DMatrix;
use tracing::info;

use crate::config::LearnerConfig;
use crate::consensus::ConsensusTerm;
use crate::dual_ascent::{
    DualAscentController, DualAscentState, InnerReport, PenalizedProblem, StepOutcome,
};
use crate::error::{DStructError, Result};
use crate::graph::binarize_sign;
use crate::metrics::{MetricsSink, TracingSink};
use crate::model::StructuralModel;

/// Augmented objective of one model on one batch, optionally coupled to the
/// rest of an ensemble through a consensus term.
pub(crate) struct PenalizedObjective<'a> {
    pub(crate) model: &'a mut StructuralModel,
    pub(crate) x: &'a DMatrix<f64>,
    pub(crate) state: &'a DualAscentState,
    pub(crate) consensus: Option<&'a ConsensusTerm>,
}

impl Objective<f64> for PenalizedObjective<'_> {
    fn dim(&self) -> usize {
        self.model.params().len()
    }

    fn eval_grad(&mut self, params: &[f64]) -> (f64, Vec<f64>) {
        self.model.set_params(params);
        let (terms, mut grad) = self.model.loss_and_gradient(self.x, self.state);
        let mut value = terms.total;
        if let Some(term) = self.consensus {
            let (c, upstream) = term.evaluate(&self.model.weighted_adjacency());
            value += c;
            self.model.adjacency_vjp(&upstream, &mut grad);
        }
        (value, grad)
    }
}

/// Warm-started inner solve; leaves the solution in `model`.
pub(crate) fn solve_inner(
    model: &mut StructuralModel,
    x: &DMatrix<f64>,
    state: &DualAscentState,
    consensus: Option<&ConsensusTerm>,
    solver: &LbfgsbConfig<f64>,
) -> InnerReport {
    let x0 = model.params().to_vec();
    let bounds = model.bounds();
    let result = {
        let mut objective = PenalizedObjective {
            model: &mut *model,
            x,
            state,
            consensus,
        };
        lbfgsb(&mut objective, &x0, &bounds, solver)
    };
    model.set_params(&result.x);
    InnerReport {
        loss: result.value,
        iterations: result.iterations,
        func_evals: result.func_evals,
        active_bounds: result.active_bounds,
        termination: result.termination,
    }
}

/// One model bound to the batch it is being fitted on.
pub(crate) struct ModelProblem<'a> {
    pub(crate) model: &'a mut StructuralModel,
    pub(crate) x: &'a DMatrix<f64>,
    pub(crate) consensus: Option<&'a ConsensusTerm>,
    pub(crate) solver: &'a LbfgsbConfig<f64>,
}

impl PenalizedProblem for ModelProblem<'_> {
    fn minimize(&mut self, state: &DualAscentState) -> InnerReport {
        solve_inner(self.model, self.x, state, self.consensus, self.solver)
    }

    fn acyclicity(&self) -> f64 {
        self.model.acyclicity()
    }
}

pub(crate) fn check_batch(x: &DMatrix<f64>, dim: usize) -> Result<()> {
    if x.ncols() != dim {
        return Err(DStructError::ShapeMismatch {
            expected: dim,
            got: x.ncols(),
        });
    }
    if x.nrows() == 0 {
        return Err(DStructError::EmptyBatch);
    }
    Ok(())
}

pub(crate) fn record_hyperparameters(sink: &mut dyn MetricsSink, config: &LearnerConfig) {
    let m = &config.model;
    sink.record("hparam/dim", m.dim as f64);
    sink.record("hparam/rho", m.rho);
    sink.record("hparam/alpha", m.alpha);
    sink.record("hparam/lambda1", m.lambda1);
    sink.record("hparam/lambda2", m.lambda2);
    sink.record("hparam/h_tol", config.dual_ascent.h_tol);
    sink.record("hparam/rho_max", config.dual_ascent.rho_max);
    sink.record("hparam/w_threshold", config.w_threshold);
    sink.record("hparam/lr", config.solver.lr);
}

/// Learns one structural model on the whole batch.
///
/// ```no_run
/// use dstruct::{LearnerConfig, NotearsLearner};
/// use nalgebra::DMatrix;
///
/// let x = DMatrix::from_fn(200, 3, |s, i| ((s * 3 + i) as f64).sin());
/// let mut learner = NotearsLearner::new(LearnerConfig::with_dim(3))?;
/// learner.fit(&x, 20)?;
/// let graph = learner.graph();
/// # Ok::<(), dstruct::DStructError>(())
/// ```
pub struct NotearsLearner {
    config: LearnerConfig,
    model: StructuralModel,
    state: DualAscentState,
    controller: DualAscentController,
    solver: LbfgsbConfig<f64>,
    sink: Box<dyn MetricsSink>,
    steps: usize,
}

impl NotearsLearner {
    /// Validate `config` and build a learner reporting to [`TracingSink`].
    pub fn new(config: LearnerConfig) -> Result<Self> {
        Self::with_sink(config, Box::new(TracingSink))
    }

    pub fn with_sink(config: LearnerConfig, mut sink: Box<dyn MetricsSink>) -> Result<Self> {
        config.validate()?;
        let model = StructuralModel::new(&config.model)?;
        let controller = DualAscentController::new(config.dual_ascent.clone())?;
        record_hyperparameters(sink.as_mut(), &config);
        Ok(NotearsLearner {
            state: DualAscentState::new(config.model.rho, config.model.alpha),
            solver: config.solver.to_lbfgsb(),
            config,
            model,
            controller,
            sink,
            steps: 0,
        })
    }

    /// One dual-ascent step on `x` (`[n, dim]`).
    pub fn training_step(&mut self, x: &DMatrix<f64>) -> Result<StepOutcome> {
        check_batch(x, self.model.dim())?;
        let mut problem = ModelProblem {
            model: &mut self.model,
            x,
            consensus: None,
            solver: &self.solver,
        };
        let outcome = self.controller.step(&mut self.state, &mut problem);
        self.steps += 1;

        self.sink.record("h", outcome.h);
        self.sink.record("rho", outcome.rho);
        self.sink.record("alpha", outcome.alpha);
        info!(
            step = self.steps,
            h = outcome.h,
            rho = outcome.rho,
            alpha = outcome.alpha,
            inner_solves = outcome.inner_solves,
            "training step"
        );
        Ok(outcome)
    }

    /// Repeat [`Self::training_step`] until `h <= h_tol`, `rho >= rho_max` or
    /// `max_steps` steps have run.
    pub fn fit(&mut self, x: &DMatrix<f64>, max_steps: usize) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::new();
        for _ in 0..max_steps {
            let outcome = self.training_step(x)?;
            outcomes.push(outcome);
            if outcome.h <= self.config.dual_ascent.h_tol
                || outcome.rho >= self.config.dual_ascent.rho_max
            {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Binarized graph under the sign rule of [`binarize_sign`].
    pub fn extract_graph(&self, threshold: f64) -> DMatrix<f64> {
        binarize_sign(&self.model.weighted_adjacency(), threshold)
    }

    /// [`Self::extract_graph`] at the configured `w_threshold`.
    pub fn graph(&self) -> DMatrix<f64> {
        self.extract_graph(self.config.w_threshold)
    }

    pub fn weighted_adjacency(&self) -> DMatrix<f64> {
        self.model.weighted_adjacency()
    }

    pub fn state(&self) -> &DualAscentState {
        &self.state
    }

    pub fn model(&self) -> &StructuralModel {
        &self.model
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Training steps run so far.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, SemType};
    use crate::metrics::MemorySink;

    fn small_config() -> LearnerConfig {
        let mut config = LearnerConfig::with_dim(3);
        config.model.nonlinear_dims = vec![4, 1];
        config.solver.max_iter = 30;
        config
    }

    fn batch() -> DMatrix<f64> {
        DMatrix::from_fn(40, 3, |s, i| {
            let t = s as f64 * 0.37;
            match i {
                0 => t.sin(),
                1 => 0.8 * t.sin() + 0.1 * (t * 3.1).cos(),
                _ => (t * 1.7).cos(),
            }
        })
    }

    #[test]
    fn rejects_wrong_column_count() {
        let mut learner = NotearsLearner::new(small_config()).unwrap();
        let err = learner.training_step(&DMatrix::zeros(10, 4)).unwrap_err();
        assert_eq!(
            err,
            DStructError::ShapeMismatch {
                expected: 3,
                got: 4
            }
        );
    }

    #[test]
    fn rejects_empty_batch() {
        let mut learner = NotearsLearner::new(small_config()).unwrap();
        let err = learner.training_step(&DMatrix::zeros(0, 3)).unwrap_err();
        assert_eq!(err, DStructError::EmptyBatch);
    }

    #[test]
    fn fresh_learner_state() {
        let learner = NotearsLearner::new(small_config()).unwrap();
        assert_eq!(learner.state().rho, 1.0);
        assert!(learner.state().h_prev.is_infinite());
        assert_eq!(learner.steps(), 0);
    }

    #[test]
    fn step_records_metrics_and_keeps_rho_a_power_of_ten() {
        let sink = MemorySink::new();
        let mut learner =
            NotearsLearner::with_sink(small_config(), Box::new(sink.clone())).unwrap();
        assert_eq!(sink.values("hparam/lambda1"), vec![0.0]);

        let x = batch();
        for _ in 0..3 {
            let outcome = learner.training_step(&x).unwrap();
            let exponent = outcome.rho.log10();
            assert!((exponent - exponent.round()).abs() < 1e-9);
            assert!(outcome.h >= 0.0);
        }
        assert_eq!(sink.values("h").len(), 3);
        assert_eq!(sink.values("rho").len(), 3);
        let alphas = sink.values("alpha");
        assert!(alphas.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn sobolev_learner_steps() {
        let config = LearnerConfig {
            model: ModelConfig {
                dim: 3,
                sem_type: SemType::Sobolev,
                sobolev_basis: 3,
                ..ModelConfig::default()
            },
            ..small_config()
        };
        let mut learner = NotearsLearner::new(config).unwrap();
        let outcome = learner.training_step(&batch()).unwrap();
        assert!(outcome.inner_solves >= 1);
        let g = learner.graph();
        for i in 0..3 {
            assert_eq!(g[(i, i)], 0.0);
        }
    }
}
