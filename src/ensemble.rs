//! DStruct: an ensemble of structural models trained on data partitions and
//! tied together by a consensus penalty.
//!
//! Every training step splits the batch into `K` subsets and runs one
//! dual-ascent step per member on its subset. While member `i` is being
//! solved, its objective carries `lmbda · consensus` evaluated against a
//! snapshot of the other members' adjacencies taken just before its step.
//! Members are stepped in order, so member `i` sees the already updated
//! members `0..i`.

use dstruct_optim::LbfgsbConfig;
use nalgebra::DMatrix;
use tracing::{debug, info};

use crate::config::EnsembleConfig;
use crate::consensus::{consensus_loss, consensus_mean, ConsensusTerm};
use crate::dual_ascent::{DualAscentController, DualAscentState, StepOutcome};
use crate::error::{DStructError, Result};
use crate::graph::{binarize_magnitude, first_dag_threshold};
use crate::learner::{check_batch, record_hyperparameters, ModelProblem};
use crate::metrics::{MetricsSink, TracingSink};
use crate::model::StructuralModel;
use crate::partition::PartitionStrategy;

/// One ensemble member and its penalty state.
#[derive(Debug, Clone)]
pub struct Member {
    model: StructuralModel,
    state: DualAscentState,
}

impl Member {
    pub fn model(&self) -> &StructuralModel {
        &self.model
    }

    pub fn state(&self) -> &DualAscentState {
        &self.state
    }
}

/// Aggregate of one ensemble training step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleStep {
    /// Largest member `h`.
    pub h: f64,
    /// Smallest member `rho`.
    pub rho: f64,
    /// Mean member `alpha`.
    pub alpha: f64,
    /// Per-member outcomes, in member order.
    pub members: Vec<StepOutcome>,
}

/// Ensemble structure learner over a [`PartitionStrategy`].
pub struct DStruct<P> {
    config: EnsembleConfig,
    members: Vec<Member>,
    controller: DualAscentController,
    solver: LbfgsbConfig<f64>,
    partition: P,
    sink: Box<dyn MetricsSink>,
    steps: usize,
}

impl<P: PartitionStrategy> DStruct<P> {
    /// Validate `config` and build `k` members; member `i` is initialised
    /// with seed `model.seed + i`.
    pub fn new(config: EnsembleConfig, partition: P) -> Result<Self> {
        Self::with_sink(config, partition, Box::new(TracingSink))
    }

    pub fn with_sink(
        config: EnsembleConfig,
        partition: P,
        mut sink: Box<dyn MetricsSink>,
    ) -> Result<Self> {
        config.validate()?;
        let learner = &config.learner;
        let members = (0..config.k)
            .map(|i| -> Result<Member> {
                let mut model_config = learner.model.clone();
                model_config.seed = model_config.seed.wrapping_add(i as u64);
                Ok(Member {
                    model: StructuralModel::new(&model_config)?,
                    state: DualAscentState::new(model_config.rho, model_config.alpha),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let controller = DualAscentController::new(learner.dual_ascent.clone())?;
        let solver = learner.solver.to_lbfgsb();

        record_hyperparameters(sink.as_mut(), learner);
        sink.record("hparam/k", config.k as f64);
        sink.record("hparam/lmbda", config.lmbda);

        Ok(DStruct {
            config,
            members,
            controller,
            solver,
            partition,
            sink,
            steps: 0,
        })
    }

    fn dim(&self) -> usize {
        self.config.learner.model.dim
    }

    /// One dual-ascent step per member on its subset of `x`.
    pub fn training_step(&mut self, x: &DMatrix<f64>) -> Result<EnsembleStep> {
        let d = self.dim();
        let k = self.config.k;
        check_batch(x, d)?;
        let subsets = self.partition.split(x, k);
        if subsets.len() != k {
            return Err(DStructError::PartitionSize {
                expected: k,
                got: subsets.len(),
            });
        }
        for subset in &subsets {
            check_batch(subset, d)?;
        }

        let mut outcomes = Vec::with_capacity(k);
        for (i, subset) in subsets.iter().enumerate() {
            let others = self
                .members
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, m)| m.model.weighted_adjacency())
                .collect();
            let term = ConsensusTerm::new(others, self.config.lmbda);

            let member = &mut self.members[i];
            let mut problem = ModelProblem {
                model: &mut member.model,
                x: subset,
                consensus: Some(&term),
                solver: &self.solver,
            };
            let outcome = self.controller.step(&mut member.state, &mut problem);
            debug!(
                member = i,
                h = outcome.h,
                rho = outcome.rho,
                alpha = outcome.alpha,
                "member step"
            );
            outcomes.push(outcome);
        }

        let step = EnsembleStep {
            h: outcomes.iter().map(|o| o.h).fold(f64::NEG_INFINITY, f64::max),
            rho: outcomes.iter().map(|o| o.rho).fold(f64::INFINITY, f64::min),
            alpha: outcomes.iter().map(|o| o.alpha).sum::<f64>() / k as f64,
            members: outcomes,
        };
        self.steps += 1;

        let consensus = self.consensus_loss();
        self.sink.record("h", step.h);
        self.sink.record("rho", step.rho);
        self.sink.record("alpha", step.alpha);
        self.sink.record("consensus", consensus);
        info!(
            step = self.steps,
            h = step.h,
            rho = step.rho,
            alpha = step.alpha,
            consensus,
            "ensemble training step"
        );
        Ok(step)
    }

    /// Repeat [`Self::training_step`] until every member has `h <= h_tol`,
    /// every member has hit `rho_max`, or `max_steps` steps have run.
    pub fn fit(&mut self, x: &DMatrix<f64>, max_steps: usize) -> Result<Vec<EnsembleStep>> {
        let schedule = self.config.learner.dual_ascent.clone();
        let mut steps = Vec::new();
        for _ in 0..max_steps {
            let step = self.training_step(x)?;
            let done = step.h <= schedule.h_tol || step.rho >= schedule.rho_max;
            steps.push(step);
            if done {
                break;
            }
        }
        Ok(steps)
    }

    /// Detached weighted adjacency of every member.
    pub fn adjacencies(&self) -> Vec<DMatrix<f64>> {
        self.members
            .iter()
            .map(|m| m.model.weighted_adjacency())
            .collect()
    }

    /// Elementwise mean of [`Self::adjacencies`].
    pub fn consensus_adjacency(&self) -> DMatrix<f64> {
        consensus_mean(&self.adjacencies())
    }

    /// Current unweighted consensus loss across members.
    pub fn consensus_loss(&self) -> f64 {
        consensus_loss(&self.adjacencies())
    }

    /// Consensus adjacency binarized by magnitude at `threshold`.
    pub fn compute_ensemble_graph(&self, threshold: f64) -> DMatrix<f64> {
        binarize_magnitude(&self.consensus_adjacency(), threshold)
    }

    /// Smallest scanned threshold in `[0, 1]` whose ensemble graph is a DAG,
    /// with that graph. `None` if even the threshold 1 leaves a cycle.
    pub fn dag_threshold(&self) -> Option<(f64, DMatrix<f64>)> {
        first_dag_threshold(&self.consensus_adjacency())
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn partition(&self) -> &P {
        &self.partition
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearnerConfig;
    use crate::error::ConfigError;
    use crate::metrics::MemorySink;
    use crate::partition::Contiguous;

    fn config(k: usize) -> EnsembleConfig {
        let mut learner = LearnerConfig::with_dim(3);
        learner.model.nonlinear_dims = vec![3, 1];
        learner.solver.max_iter = 20;
        EnsembleConfig {
            learner,
            k,
            lmbda: 2.0,
        }
    }

    fn batch() -> DMatrix<f64> {
        DMatrix::from_fn(30, 3, |s, i| ((s * 3 + i) as f64 * 0.41).sin())
    }

    struct Broken;

    impl PartitionStrategy for Broken {
        fn split(&mut self, x: &DMatrix<f64>, _k: usize) -> Vec<DMatrix<f64>> {
            vec![x.clone()]
        }
    }

    struct Starving;

    impl PartitionStrategy for Starving {
        fn split(&mut self, x: &DMatrix<f64>, k: usize) -> Vec<DMatrix<f64>> {
            let mut parts = vec![x.clone(); k - 1];
            parts.push(DMatrix::zeros(0, x.ncols()));
            parts
        }
    }

    #[test]
    fn zero_members_rejected() {
        let err = DStruct::new(config(0), Contiguous).err();
        assert_eq!(
            err,
            Some(DStructError::Config(ConfigError::InvalidEnsembleSize(0)))
        );
    }

    #[test]
    fn members_get_distinct_seeds() {
        let ensemble = DStruct::new(config(3), Contiguous).unwrap();
        let params: Vec<Vec<f64>> = ensemble
            .members()
            .iter()
            .map(|m| m.model().params().to_vec())
            .collect();
        assert_ne!(params[0], params[1]);
        assert_ne!(params[1], params[2]);
    }

    #[test]
    fn wrong_partition_count_rejected() {
        let mut ensemble = DStruct::new(config(3), Broken).unwrap();
        let err = ensemble.training_step(&batch()).unwrap_err();
        assert_eq!(
            err,
            DStructError::PartitionSize {
                expected: 3,
                got: 1
            }
        );
    }

    #[test]
    fn empty_subset_rejected() {
        let mut ensemble = DStruct::new(config(2), Starving).unwrap();
        let err = ensemble.training_step(&batch()).unwrap_err();
        assert_eq!(err, DStructError::EmptyBatch);
    }

    #[test]
    fn step_aggregates_member_outcomes() {
        let sink = MemorySink::new();
        let mut ensemble =
            DStruct::with_sink(config(3), Contiguous, Box::new(sink.clone())).unwrap();
        let step = ensemble.training_step(&batch()).unwrap();
        assert_eq!(step.members.len(), 3);

        let max_h = step.members.iter().map(|o| o.h).fold(f64::MIN, f64::max);
        let min_rho = step.members.iter().map(|o| o.rho).fold(f64::MAX, f64::min);
        let mean_alpha = step.members.iter().map(|o| o.alpha).sum::<f64>() / 3.0;
        assert_eq!(step.h, max_h);
        assert_eq!(step.rho, min_rho);
        assert!((step.alpha - mean_alpha).abs() < 1e-12);

        assert_eq!(sink.values("hparam/k"), vec![3.0]);
        assert_eq!(sink.values("h"), vec![step.h]);
        assert_eq!(sink.values("consensus").len(), 1);
    }

    #[test]
    fn single_member_has_no_consensus_pull() {
        let ensemble = DStruct::new(config(1), Contiguous).unwrap();
        assert_eq!(ensemble.consensus_loss(), 0.0);
        let g = ensemble.compute_ensemble_graph(0.0);
        for i in 0..3 {
            assert_eq!(g[(i, i)], 0.0);
        }
    }
}
