use std::fmt;

use num_traits::Float;

use crate::bounds::Bounds;
use crate::convergence::norm;

/// Outcome of a bounded minimization.
#[derive(Debug, Clone)]
pub struct OptimResult<F> {
    /// Final iterate, inside the box.
    pub x: Vec<F>,
    pub value: F,
    /// Norm of the projected gradient at `x`; zero at a bounded stationary point.
    pub projected_gradient_norm: F,
    /// Variables held at a bound by the gradient at `x`.
    pub active_bounds: usize,
    pub iterations: usize,
    pub func_evals: usize,
    pub termination: TerminationReason,
}

impl<F: Float> OptimResult<F> {
    /// Summarize the state `(x, value, grad)` reached after `iterations`.
    pub(crate) fn at(
        x: Vec<F>,
        value: F,
        grad: &[F],
        bounds: &Bounds<F>,
        iterations: usize,
        func_evals: usize,
        termination: TerminationReason,
    ) -> Self {
        let active_bounds = (0..x.len())
            .filter(|&i| bounds.is_active(i, x[i], grad[i]))
            .count();
        OptimResult {
            projected_gradient_norm: norm(&bounds.projected_gradient(&x, grad)),
            active_bounds,
            x,
            value,
            iterations,
            func_evals,
            termination,
        }
    }
}

impl<F> OptimResult<F> {
    /// True when a tolerance test fired, false on budget exhaustion or failure.
    pub fn converged(&self) -> bool {
        matches!(
            self.termination,
            TerminationReason::GradientNorm
                | TerminationReason::StepSize
                | TerminationReason::FunctionChange
        )
    }
}

/// Why [`crate::lbfgsb`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    GradientNorm,
    StepSize,
    /// Relative objective decrease below `func_tol`.
    FunctionChange,
    MaxIterations,
    /// No sufficient decrease along either the quasi-Newton or the steepest
    /// descent direction.
    LineSearchFailed,
    /// Unusable configuration or a non-finite objective at the start point.
    NumericalError,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TerminationReason::GradientNorm => "projected gradient below tolerance",
            TerminationReason::StepSize => "step below tolerance",
            TerminationReason::FunctionChange => "relative decrease below tolerance",
            TerminationReason::MaxIterations => "iteration budget exhausted",
            TerminationReason::LineSearchFailed => "line search failed",
            TerminationReason::NumericalError => "numerical error",
        };
        f.write_str(msg)
    }
}
