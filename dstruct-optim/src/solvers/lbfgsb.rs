use std::collections::VecDeque;

use num_traits::Float;

use crate::bounds::Bounds;
use crate::convergence::{dot, norm, relative_decrease, ConvergenceParams};
use crate::line_search::{projected_backtracking, ArmijoParams, LineSearchResult};
use crate::objective::Objective;
use crate::result::{OptimResult, TerminationReason};

/// Configuration for the box-constrained L-BFGS solver.
#[derive(Debug, Clone)]
pub struct LbfgsbConfig<F> {
    /// Number of recent (s, y) pairs to store (default: 10).
    pub memory: usize,
    /// Length of a step taken without curvature history (default: 1.0).
    ///
    /// The steepest-descent direction is rescaled to this length before the
    /// line search, both on the first iteration and after a history reset.
    pub initial_step: F,
    /// Convergence parameters.
    pub convergence: ConvergenceParams<F>,
    /// Line search parameters.
    pub line_search: ArmijoParams<F>,
}

impl Default for LbfgsbConfig<f64> {
    fn default() -> Self {
        LbfgsbConfig {
            memory: 10,
            initial_step: 1.0,
            convergence: ConvergenceParams::default(),
            line_search: ArmijoParams::default(),
        }
    }
}

impl Default for LbfgsbConfig<f32> {
    fn default() -> Self {
        LbfgsbConfig {
            memory: 10,
            initial_step: 1.0,
            convergence: ConvergenceParams::default(),
            line_search: ArmijoParams::default(),
        }
    }
}

/// Bounded curvature history of (s, y, 1/sᵀy) triples, oldest first.
struct History<F> {
    capacity: usize,
    pairs: VecDeque<(Vec<F>, Vec<F>, F)>,
}

impl<F: Float> History<F> {
    fn new(capacity: usize) -> Self {
        History {
            capacity,
            pairs: VecDeque::with_capacity(capacity),
        }
    }

    fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Store the pair when it carries positive curvature; otherwise skip it.
    fn push(&mut self, s: Vec<F>, y: Vec<F>) {
        let sy = dot(&s, &y);
        let yy = dot(&y, &y);
        if sy <= F::epsilon() * yy || sy <= F::zero() {
            return;
        }
        if self.pairs.len() == self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back((s, y, F::one() / sy));
    }
}

/// Box-constrained L-BFGS ("L-BFGS-B" style) minimization.
///
/// Minimizes `obj` over the box `bounds`, starting from `x0` projected into
/// the box. Search directions come from the two-loop recursion restricted to
/// the free variables (those not held at a bound by the gradient), and steps
/// follow the projected path with a backtracking Armijo search. A failed
/// line search clears the curvature history and retries once along steepest
/// descent before giving up.
///
/// Calling it again from the returned `x` continues the minimization with a
/// fresh history, which is how the dual-ascent loop warm-starts each solve.
pub fn lbfgsb<F: Float, O: Objective<F>>(
    obj: &mut O,
    x0: &[F],
    bounds: &Bounds<F>,
    config: &LbfgsbConfig<F>,
) -> OptimResult<F> {
    let n = x0.len();
    assert_eq!(bounds.len(), n, "bounds must cover every variable");
    let tol = &config.convergence;

    let mut x = x0.to_vec();
    bounds.project(&mut x);

    if config.memory == 0 || tol.max_iter == 0 {
        let zeros = vec![F::zero(); n];
        return OptimResult::at(
            x,
            F::zero(),
            &zeros,
            bounds,
            0,
            0,
            TerminationReason::NumericalError,
        );
    }

    let (mut f_val, mut grad) = obj.eval_grad(&x);
    let mut func_evals = 1;
    if !f_val.is_finite() {
        let reason = TerminationReason::NumericalError;
        return OptimResult::at(x, f_val, &grad, bounds, 0, func_evals, reason);
    }
    if norm(&bounds.projected_gradient(&x, &grad)) < tol.grad_tol {
        let reason = TerminationReason::GradientNorm;
        return OptimResult::at(x, f_val, &grad, bounds, 0, func_evals, reason);
    }

    let mut history = History::new(config.memory);
    for iter in 0..tol.max_iter {
        let found = search(obj, &x, f_val, &grad, bounds, &history, config).or_else(|| {
            if history.is_empty() {
                return None;
            }
            history.clear();
            search(obj, &x, f_val, &grad, bounds, &history, config)
        });
        let Some(ls) = found else {
            let reason = TerminationReason::LineSearchFailed;
            return OptimResult::at(x, f_val, &grad, bounds, iter, func_evals, reason);
        };
        func_evals += ls.evals;

        let s: Vec<F> = ls.x.iter().zip(&x).map(|(&a, &b)| a - b).collect();
        let y: Vec<F> = ls.gradient.iter().zip(&grad).map(|(&a, &b)| a - b).collect();
        let step_norm = norm(&s);
        let f_prev = f_val;

        x = ls.x;
        f_val = ls.value;
        grad = ls.gradient;
        history.push(s, y);

        let stop = if norm(&bounds.projected_gradient(&x, &grad)) < tol.grad_tol {
            Some(TerminationReason::GradientNorm)
        } else if step_norm < tol.step_tol {
            Some(TerminationReason::StepSize)
        } else if tol.func_tol > F::zero() && relative_decrease(f_prev, f_val) < tol.func_tol {
            Some(TerminationReason::FunctionChange)
        } else {
            None
        };
        if let Some(reason) = stop {
            return OptimResult::at(x, f_val, &grad, bounds, iter + 1, func_evals, reason);
        }
    }

    let reason = TerminationReason::MaxIterations;
    OptimResult::at(x, f_val, &grad, bounds, tol.max_iter, func_evals, reason)
}

fn search<F: Float, O: Objective<F>>(
    obj: &mut O,
    x: &[F],
    f_val: F,
    grad: &[F],
    bounds: &Bounds<F>,
    history: &History<F>,
    config: &LbfgsbConfig<F>,
) -> Option<LineSearchResult<F>> {
    let d = search_direction(x, grad, bounds, history, config.initial_step);
    projected_backtracking(obj, x, &d, f_val, grad, bounds, &config.line_search)
}

/// Quasi-Newton direction over the free variables; zero on the active set.
fn search_direction<F: Float>(
    x: &[F],
    grad: &[F],
    bounds: &Bounds<F>,
    history: &History<F>,
    initial_step: F,
) -> Vec<F> {
    let free: Vec<bool> = (0..x.len())
        .map(|i| bounds.lower(i) < bounds.upper(i) && !bounds.is_active(i, x[i], grad[i]))
        .collect();
    let restrict = |v: &[F]| -> Vec<F> {
        v.iter()
            .zip(free.iter())
            .map(|(&vi, &f)| if f { vi } else { F::zero() })
            .collect()
    };

    let q = restrict(grad);
    let steepest = |q: &[F]| -> Vec<F> {
        let q_norm = norm(q);
        let scale = if q_norm > F::zero() {
            initial_step / q_norm
        } else {
            F::one()
        };
        q.iter().map(|&qi| F::zero() - qi * scale).collect()
    };

    if history.is_empty() {
        return steepest(&q);
    }

    let pairs: Vec<(Vec<F>, Vec<F>, F)> = history
        .pairs
        .iter()
        .map(|(s, y, _)| {
            let (s, y) = (restrict(s), restrict(y));
            let sy = dot(&s, &y);
            (s, y, sy)
        })
        .collect();
    // Projection onto the free set can destroy curvature; fall back if so.
    if pairs.iter().any(|(_, _, sy)| *sy <= F::zero()) {
        return steepest(&q);
    }

    let d = two_loop_recursion(&q, &pairs);
    if dot(grad, &d) >= F::zero() {
        return steepest(&q);
    }
    d
}

/// L-BFGS two-loop recursion: compute d = -H_k * q.
fn two_loop_recursion<F: Float>(q: &[F], pairs: &[(Vec<F>, Vec<F>, F)]) -> Vec<F> {
    let k = pairs.len();
    let mut r = q.to_vec();

    // First loop: newest to oldest
    let mut alpha = vec![F::zero(); k];
    for i in (0..k).rev() {
        let (s, y, sy) = &pairs[i];
        alpha[i] = dot(s, &r) / *sy;
        for (rj, &yj) in r.iter_mut().zip(y.iter()) {
            *rj = *rj - alpha[i] * yj;
        }
    }

    // Initial Hessian approximation: H_0 = gamma * I, gamma = sᵀy / yᵀy
    let (_, y_last, sy_last) = &pairs[k - 1];
    let yy = dot(y_last, y_last);
    if yy > F::zero() {
        let gamma = *sy_last / yy;
        for v in r.iter_mut() {
            *v = *v * gamma;
        }
    }

    // Second loop: oldest to newest
    for i in 0..k {
        let (s, y, sy) = &pairs[i];
        let beta = dot(y, &r) / *sy;
        for (rj, &sj) in r.iter_mut().zip(s.iter()) {
            *rj = *rj + (alpha[i] - beta) * sj;
        }
    }

    r.iter().map(|&v| F::zero() - v).collect()
}
