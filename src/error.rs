//! Error types.
//!
//! Only structural misconfiguration and malformed inputs are errors. A dual
//! ascent run that exhausts `rho_max` without driving `h` to zero is not: it
//! is reported through the returned step outcomes and the metrics sink.

use thiserror::Error;

/// Invalid construction-time configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The number of variables must be positive.
    #[error("dimension must be positive, got {0}")]
    InvalidDim(usize),
    /// `sem_type` named a model family that does not exist.
    #[error("unknown sem_type {0:?} (expected \"mlp\" or \"sobolev\")")]
    UnknownSemType(String),
    /// The ensemble needs at least one member.
    #[error("ensemble size K must be at least 1, got {0}")]
    InvalidEnsembleSize(usize),
    /// The nonlinear architecture widths are unusable.
    #[error("invalid architecture {dims:?}: {reason}")]
    InvalidArchitecture {
        /// Offending widths, input dimension included.
        dims: Vec<usize>,
        /// What is wrong with them.
        reason: &'static str,
    },
    /// A scalar hyperparameter is outside its admissible range.
    #[error("{name} = {value} is out of range: {reason}")]
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
        /// Admissible range.
        reason: &'static str,
    },
}

/// Errors raised by the learners and the data utilities.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DStructError {
    /// Configuration rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Batch column count does not match the model dimension.
    #[error("batch has {got} columns, model expects {expected}")]
    ShapeMismatch {
        /// Model dimension.
        expected: usize,
        /// Columns in the batch.
        got: usize,
    },
    /// A batch (or a partition subset) has no rows.
    #[error("batch has no rows")]
    EmptyBatch,
    /// The partition strategy produced the wrong number of subsets.
    #[error("partition produced {got} subsets, ensemble has {expected} members")]
    PartitionSize {
        /// Ensemble size K.
        expected: usize,
        /// Subsets returned.
        got: usize,
    },
    /// The weight matrix handed to the simulator is not a DAG.
    #[error("weighted adjacency contains a cycle")]
    NotADag,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DStructError>;
