//! Augmented-Lagrangian schedule for the acyclicity constraint.
//!
//! The controller owns no parameters. It drives a [`PenalizedProblem`] through
//! warm-started inner solves while escalating `rho` and then absorbs the
//! remaining violation into `alpha`:
//!
//! ```text
//! h_new = h(θ)
//! while rho < rho_max:
//!     θ = argmin L(θ; rho, alpha)        // warm start
//!     h_new = h(θ)
//!     if h_new > progress_ratio * h_prev: rho *= rho_factor
//!     else: break
//! alpha += rho * h_new
//! h_prev = h_new
//! ```
//!
//! `h` is read once before the loop so a step entered with `rho >= rho_max`
//! still has a defined `h_new`.

use dstruct_optim::TerminationReason;
use tracing::{debug, trace};

use crate::config::DualAscentConfig;
use crate::error::ConfigError;

/// Penalty state of one model: `(rho, alpha, h_prev)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DualAscentState {
    /// Quadratic penalty coefficient.
    pub rho: f64,
    /// Lagrange multiplier of `h(θ) = 0`.
    pub alpha: f64,
    /// Acyclicity recorded by the previous step; `+∞` before the first one.
    pub h_prev: f64,
}

impl DualAscentState {
    pub fn new(rho: f64, alpha: f64) -> Self {
        DualAscentState {
            rho,
            alpha,
            h_prev: f64::INFINITY,
        }
    }
}

/// Summary of one inner minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InnerReport {
    /// Final value of the penalized objective.
    pub loss: f64,
    pub iterations: usize,
    pub func_evals: usize,
    /// Parameters left at a bound.
    pub active_bounds: usize,
    pub termination: TerminationReason,
}

/// A parametric problem whose penalized objective can be minimized in place.
pub trait PenalizedProblem {
    /// Run one inner minimization under `state`, starting from the current
    /// parameters and leaving the result in place.
    fn minimize(&mut self, state: &DualAscentState) -> InnerReport;

    /// Current acyclicity `h`. Must not disturb any solver state.
    fn acyclicity(&self) -> f64;
}

/// Why the escalation loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// `h_new <= progress_ratio * h_prev` at the current `rho`.
    Progress,
    /// `rho` reached `rho_max`; `h` is accepted as is.
    RhoCeiling,
}

/// Result of [`DualAscentController::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepOutcome {
    /// `alpha` after the multiplier update.
    pub alpha: f64,
    pub rho: f64,
    /// `h_new`.
    pub h: f64,
    /// Number of times `rho` was multiplied.
    pub escalations: usize,
    pub inner_solves: usize,
    pub stop: StopReason,
}

/// Runs dual-ascent steps with a fixed schedule.
#[derive(Debug, Clone)]
pub struct DualAscentController {
    config: DualAscentConfig,
}

impl DualAscentController {
    pub fn new(config: DualAscentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(DualAscentController { config })
    }

    pub fn config(&self) -> &DualAscentConfig {
        &self.config
    }

    /// One outer step: escalate `rho` until acyclicity makes progress or the
    /// ceiling is hit, then update `alpha` and `h_prev`.
    pub fn step<P: PenalizedProblem + ?Sized>(
        &self,
        state: &mut DualAscentState,
        problem: &mut P,
    ) -> StepOutcome {
        let mut h_new = problem.acyclicity();
        let mut escalations = 0;
        let mut inner_solves = 0;
        let mut stop = StopReason::RhoCeiling;

        while state.rho < self.config.rho_max {
            let report = problem.minimize(state);
            inner_solves += 1;
            h_new = problem.acyclicity();
            trace!(
                rho = state.rho,
                loss = report.loss,
                iterations = report.iterations,
                func_evals = report.func_evals,
                active_bounds = report.active_bounds,
                termination = %report.termination,
                h = h_new,
                "inner solve"
            );

            if h_new > self.config.progress_ratio * state.h_prev {
                state.rho *= self.config.rho_factor;
                escalations += 1;
                debug!(rho = state.rho, h = h_new, h_prev = state.h_prev, "escalating rho");
            } else {
                stop = StopReason::Progress;
                break;
            }
        }

        state.alpha += state.rho * h_new;
        state.h_prev = h_new;

        StepOutcome {
            alpha: state.alpha,
            rho: state.rho,
            h: h_new,
            escalations,
            inner_solves,
            stop,
        }
    }
}
