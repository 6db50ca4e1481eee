//! Hyperparameters for the structural models, the dual-ascent schedule, the
//! inner solver and the two learners.
//!
//! Every struct carries the reference constants in its `Default` impl and a
//! `validate` method; the learners call `validate` in their constructors so a
//! bad configuration fails before any data is touched.

use std::fmt;
use std::str::FromStr;

use dstruct_optim::{ArmijoParams, ConvergenceParams, LbfgsbConfig};

use crate::error::ConfigError;

/// Structural equation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SemType {
    /// Per-variable multilayer perceptrons sharing a split first layer.
    #[default]
    Mlp,
    /// Additive models over a truncated Sobolev sine basis.
    Sobolev,
}

impl FromStr for SemType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mlp" => Ok(SemType::Mlp),
            "sobolev" => Ok(SemType::Sobolev),
            _ => Err(ConfigError::UnknownSemType(s.to_string())),
        }
    }
}

impl fmt::Display for SemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemType::Mlp => write!(f, "mlp"),
            SemType::Sobolev => write!(f, "sobolev"),
        }
    }
}

/// Structural model hyperparameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelConfig {
    /// Number of observed variables.
    pub dim: usize,
    /// Hidden widths after the input layer; the last entry must be 1 (MLP only).
    pub nonlinear_dims: Vec<usize>,
    /// Model family.
    pub sem_type: SemType,
    /// Number of Sobolev basis functions per variable (Sobolev only).
    pub sobolev_basis: usize,
    /// Initial penalty coefficient.
    pub rho: f64,
    /// Initial Lagrange multiplier.
    pub alpha: f64,
    /// L1 weight on the first-layer parameters.
    pub lambda1: f64,
    /// L2 weight.
    pub lambda2: f64,
    /// Seed for parameter initialization.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            dim: 5,
            nonlinear_dims: vec![10, 10, 1],
            sem_type: SemType::Mlp,
            sobolev_basis: 5,
            rho: 1.0,
            alpha: 1.0,
            lambda1: 0.0,
            lambda2: 0.0,
            seed: 0,
        }
    }
}

impl ModelConfig {
    /// Layer widths including the input layer: `[dim, nonlinear_dims...]`.
    pub fn architecture(&self) -> Vec<usize> {
        std::iter::once(self.dim)
            .chain(self.nonlinear_dims.iter().copied())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim == 0 {
            return Err(ConfigError::InvalidDim(self.dim));
        }
        match self.sem_type {
            SemType::Mlp => {
                let dims = self.architecture();
                if dims.len() < 3 {
                    return Err(ConfigError::InvalidArchitecture {
                        dims,
                        reason: "need at least one hidden width followed by the output width",
                    });
                }
                if dims.contains(&0) {
                    return Err(ConfigError::InvalidArchitecture {
                        dims,
                        reason: "widths must be positive",
                    });
                }
                if dims.last() != Some(&1) {
                    return Err(ConfigError::InvalidArchitecture {
                        dims,
                        reason: "output width must be 1",
                    });
                }
            }
            SemType::Sobolev => {
                if self.sobolev_basis == 0 {
                    return Err(ConfigError::OutOfRange {
                        name: "sobolev_basis",
                        value: 0.0,
                        reason: "must be at least 1",
                    });
                }
            }
        }
        check(
            "rho",
            self.rho,
            self.rho > 0.0 && self.rho.is_finite(),
            "must be positive and finite",
        )?;
        check("alpha", self.alpha, self.alpha.is_finite(), "must be finite")?;
        check("lambda1", self.lambda1, self.lambda1 >= 0.0, "must be non-negative")?;
        check("lambda2", self.lambda2, self.lambda2 >= 0.0, "must be non-negative")?;
        Ok(())
    }
}

/// Penalty schedule of the dual-ascent loop.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DualAscentConfig {
    /// Acyclicity level at which `fit` stops early. The per-step loop ignores it.
    pub h_tol: f64,
    /// Escalation ceiling for `rho`.
    pub rho_max: f64,
    /// Factor applied to `rho` on each escalation.
    pub rho_factor: f64,
    /// A solve counts as progress when `h_new <= progress_ratio * h_prev`.
    pub progress_ratio: f64,
}

impl Default for DualAscentConfig {
    fn default() -> Self {
        DualAscentConfig {
            h_tol: 1e-8,
            rho_max: 1e16,
            rho_factor: 10.0,
            progress_ratio: 0.25,
        }
    }
}

impl DualAscentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("h_tol", self.h_tol, self.h_tol >= 0.0, "must be non-negative")?;
        check("rho_max", self.rho_max, self.rho_max > 0.0, "must be positive")?;
        check(
            "rho_factor",
            self.rho_factor,
            self.rho_factor > 1.0 && self.rho_factor.is_finite(),
            "must exceed 1",
        )?;
        check(
            "progress_ratio",
            self.progress_ratio,
            self.progress_ratio > 0.0 && self.progress_ratio <= 1.0,
            "must lie in (0, 1]",
        )?;
        Ok(())
    }
}

/// Inner quasi-Newton solver settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Iteration cap per inner solve.
    pub max_iter: usize,
    /// Curvature pairs kept by L-BFGS.
    pub memory: usize,
    /// Projected gradient tolerance.
    pub grad_tol: f64,
    /// Relative objective decrease tolerance.
    pub func_tol: f64,
    /// Length of steps taken without curvature history.
    pub lr: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_iter: 1000,
            memory: 10,
            grad_tol: 1e-5,
            func_tol: 2.2e-9,
            lr: 1e-3,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iter == 0 {
            return Err(ConfigError::OutOfRange {
                name: "max_iter",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        if self.memory == 0 {
            return Err(ConfigError::OutOfRange {
                name: "memory",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        check("grad_tol", self.grad_tol, self.grad_tol >= 0.0, "must be non-negative")?;
        check("func_tol", self.func_tol, self.func_tol >= 0.0, "must be non-negative")?;
        check("lr", self.lr, self.lr > 0.0 && self.lr.is_finite(), "must be positive")?;
        Ok(())
    }

    /// Solver configuration for [`dstruct_optim::lbfgsb`].
    pub fn to_lbfgsb(&self) -> LbfgsbConfig<f64> {
        LbfgsbConfig {
            memory: self.memory,
            initial_step: self.lr,
            convergence: ConvergenceParams {
                max_iter: self.max_iter,
                grad_tol: self.grad_tol,
                step_tol: 1e-12,
                func_tol: self.func_tol,
            },
            line_search: ArmijoParams::default(),
        }
    }
}

/// Single-model learner configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LearnerConfig {
    pub model: ModelConfig,
    pub dual_ascent: DualAscentConfig,
    pub solver: SolverConfig,
    /// Post-hoc binarization cutoff.
    pub w_threshold: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            model: ModelConfig::default(),
            dual_ascent: DualAscentConfig::default(),
            solver: SolverConfig::default(),
            w_threshold: 0.3,
        }
    }
}

impl LearnerConfig {
    /// Defaults for a `dim`-variable problem.
    pub fn with_dim(dim: usize) -> Self {
        LearnerConfig {
            model: ModelConfig {
                dim,
                ..ModelConfig::default()
            },
            ..LearnerConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;
        self.dual_ascent.validate()?;
        self.solver.validate()?;
        check(
            "w_threshold",
            self.w_threshold,
            (0.0..=1.0).contains(&self.w_threshold),
            "must lie in [0, 1]",
        )
    }
}

/// Ensemble learner configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnsembleConfig {
    /// Settings shared by every member; member `i` is seeded with `seed + i`.
    pub learner: LearnerConfig,
    /// Number of members (and data subsets).
    pub k: usize,
    /// Weight of the consensus term in each member's objective.
    pub lmbda: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        EnsembleConfig {
            learner: LearnerConfig::with_dim(5),
            k: 5,
            lmbda: 2.0,
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.learner.validate()?;
        if self.k == 0 {
            return Err(ConfigError::InvalidEnsembleSize(self.k));
        }
        check(
            "lmbda",
            self.lmbda,
            self.lmbda >= 0.0 && self.lmbda.is_finite(),
            "must be non-negative",
        )
    }
}

fn check(
    name: &'static str,
    value: f64,
    ok: bool,
    reason: &'static str,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sem_type_parses_known_names() {
        assert_eq!("mlp".parse::<SemType>(), Ok(SemType::Mlp));
        assert_eq!("Sobolev".parse::<SemType>(), Ok(SemType::Sobolev));
        assert_eq!(
            "unknown".parse::<SemType>(),
            Err(ConfigError::UnknownSemType("unknown".into()))
        );
    }

    #[test]
    fn default_mlp_has_two_hidden_layers() {
        let config = LearnerConfig::with_dim(4);
        assert_eq!(config.model.architecture(), vec![4, 10, 10, 1]);
    }

    #[test]
    fn defaults_validate() {
        assert!(LearnerConfig::with_dim(3).validate().is_ok());
        assert!(EnsembleConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_dim_rejected() {
        let config = LearnerConfig::with_dim(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidDim(0)));
    }

    #[test]
    fn zero_members_rejected() {
        let config = EnsembleConfig {
            k: 0,
            ..EnsembleConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidEnsembleSize(0)));
    }

    #[test]
    fn mlp_output_width_must_be_one() {
        let mut config = LearnerConfig::with_dim(3);
        config.model.nonlinear_dims = vec![10, 2];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidArchitecture { .. })
        ));
    }

    #[test]
    fn threshold_outside_unit_interval_rejected() {
        let mut config = LearnerConfig::with_dim(3);
        config.w_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                name: "w_threshold",
                ..
            })
        ));
    }

    #[test]
    fn lr_feeds_first_step() {
        let solver = SolverConfig {
            lr: 0.25,
            ..SolverConfig::default()
        };
        assert_eq!(solver.to_lbfgsb().initial_step, 0.25);
    }
}
