use num_traits::Float;

use crate::bounds::Bounds;
use crate::convergence::dot;
use crate::objective::Objective;

/// Parameters for the backtracking Armijo line search.
#[derive(Debug, Clone)]
pub struct ArmijoParams<F> {
    /// Sufficient decrease parameter (default: 1e-4).
    pub c: F,
    /// Backtracking factor (default: 0.5).
    pub rho: F,
    /// Initial step size (default: 1.0).
    pub alpha_init: F,
    /// Minimum step size before declaring failure (default: 1e-16).
    pub alpha_min: F,
}

impl Default for ArmijoParams<f64> {
    fn default() -> Self {
        ArmijoParams {
            c: 1e-4,
            rho: 0.5,
            alpha_init: 1.0,
            alpha_min: 1e-16,
        }
    }
}

impl Default for ArmijoParams<f32> {
    fn default() -> Self {
        ArmijoParams {
            c: 1e-4,
            rho: 0.5,
            alpha_init: 1.0,
            alpha_min: 1e-8,
        }
    }
}

/// Result of a successful line search.
#[derive(Debug)]
pub struct LineSearchResult<F> {
    /// The accepted step size.
    pub alpha: F,
    /// The accepted point `P(x + alpha * d)`.
    pub x: Vec<F>,
    /// Objective value at the accepted point.
    pub value: F,
    /// Gradient at the accepted point.
    pub gradient: Vec<F>,
    /// Number of function evaluations used.
    pub evals: usize,
}

/// Backtracking line search along the projected path `x(alpha) = P(x + alpha*d)`.
///
/// Accepts the first `alpha` with
/// `f(x(alpha)) <= f(x) + c * g^T (x(alpha) - x)`.
///
/// Returns `None` if `d` is not a descent direction, if `alpha` falls below
/// `alpha_min`, or if the projection collapses the step to zero.
pub fn projected_backtracking<F: Float, O: Objective<F>>(
    obj: &mut O,
    x: &[F],
    d: &[F],
    f_x: F,
    grad_x: &[F],
    bounds: &Bounds<F>,
    params: &ArmijoParams<F>,
) -> Option<LineSearchResult<F>> {
    let n = x.len();

    // Not a descent direction; the caller decides what to do.
    if dot(grad_x, d) >= F::zero() {
        return None;
    }

    let mut alpha = params.alpha_init;
    let mut x_new = vec![F::zero(); n];
    let mut step = vec![F::zero(); n];
    let mut evals = 0;

    loop {
        if alpha < params.alpha_min {
            return None;
        }

        for i in 0..n {
            x_new[i] = x[i] + alpha * d[i];
        }
        bounds.project(&mut x_new);
        for i in 0..n {
            step[i] = x_new[i] - x[i];
        }

        let decrease = dot(grad_x, &step);
        if decrease >= F::zero() {
            // The box swallowed every descending component.
            return None;
        }

        let (f_new, g_new) = obj.eval_grad(&x_new);
        evals += 1;

        if f_new.is_finite() && f_new <= f_x + params.c * decrease {
            return Some(LineSearchResult {
                alpha,
                x: x_new,
                value: f_new,
                gradient: g_new,
                evals,
            });
        }

        alpha = alpha * params.rho;
    }
}
