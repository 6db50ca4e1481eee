//! Nonlinear DAG structure learning by dual ascent.
//!
//! [`NotearsLearner`] fits one structural model under the trace-exponential
//! acyclicity constraint. [`DStruct`] trains `K` models on partitions of the
//! data and couples them through a consensus penalty on their adjacencies.

pub mod config;
pub mod consensus;
pub mod dual_ascent;
pub mod ensemble;
pub mod error;
pub mod graph;
pub mod learner;
pub mod metrics;
pub mod model;
pub mod partition;
pub mod simulate;

pub use config::{
    DualAscentConfig, EnsembleConfig, LearnerConfig, ModelConfig, SemType, SolverConfig,
};
pub use consensus::{consensus_loss, consensus_mean, ConsensusTerm};
pub use dual_ascent::{
    DualAscentController, DualAscentState, InnerReport, PenalizedProblem, StepOutcome, StopReason,
};
pub use ensemble::{DStruct, EnsembleStep, Member};
pub use error::{ConfigError, DStructError, Result};
pub use learner::NotearsLearner;
pub use metrics::{MemorySink, MetricsSink, TracingSink};
pub use model::{LossTerms, Sem, SemModel, StructuralModel};
pub use partition::{Bootstrap, Contiguous, PartitionStrategy, Shuffled};
