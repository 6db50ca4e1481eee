use num_traits::Float;

/// Parameters controlling convergence checks.
#[derive(Debug, Clone)]
pub struct ConvergenceParams<F> {
    /// Maximum number of iterations (default: 100).
    pub max_iter: usize,
    /// Projected gradient norm tolerance: stop when `||P(g)|| < grad_tol` (default: 1e-8).
    pub grad_tol: F,
    /// Step size tolerance: stop when `||x_{k+1} - x_k|| < step_tol` (default: 1e-12).
    pub step_tol: F,
    /// Relative function change tolerance:
    /// stop when `(f_k - f_{k+1}) / max(|f_k|, |f_{k+1}|, 1) < func_tol` (default: 0, disabled).
    pub func_tol: F,
}

impl Default for ConvergenceParams<f64> {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: 100,
            grad_tol: 1e-8,
            step_tol: 1e-12,
            func_tol: 0.0,
        }
    }
}

impl Default for ConvergenceParams<f32> {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: 100,
            grad_tol: 1e-5,
            step_tol: 1e-7,
            func_tol: 0.0,
        }
    }
}

/// Compute the L2 norm of a vector.
pub fn norm<F: Float>(v: &[F]) -> F {
    v.iter().fold(F::zero(), |s, &x| s + x * x).sqrt()
}

/// Compute the dot product of two vectors.
pub fn dot<F: Float>(a: &[F], b: &[F]) -> F {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .fold(F::zero(), |s, (&x, &y)| s + x * y)
}

/// Relative decrease `(f_prev - f) / max(|f_prev|, |f|, 1)`.
///
/// Matches the scale-free `factr` test of the classic L-BFGS-B code.
pub fn relative_decrease<F: Float>(f_prev: F, f: F) -> F {
    let scale = f_prev.abs().max(f.abs()).max(F::one());
    (f_prev - f) / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_and_dot() {
        assert_eq!(norm(&[3.0_f64, 4.0]), 5.0);
        assert_eq!(dot(&[1.0_f64, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }

    #[test]
    fn relative_decrease_is_scale_free_above_one() {
        let small = relative_decrease(2.0_f64, 1.0);
        let large = relative_decrease(2000.0_f64, 1000.0);
        assert!((small - large).abs() < 1e-12);
        // Below unit magnitude the denominator clamps to 1.
        assert!((relative_decrease(0.5_f64, 0.25) - 0.25).abs() < 1e-12);
    }
}
