//! Trace-exponential acyclicity measure (Zheng et al., 2018).
//!
//! For a non-negative matrix `A`, `h(A) = tr(e^A) - d` is zero exactly when
//! the graph with edge weights `A` has no directed cycle, and positive otherwise.

use nalgebra::DMatrix;

/// `h(A) = tr(e^A) - d`, clamped at zero against round-off.
pub fn acyclicity(a: &DMatrix<f64>) -> f64 {
    (a.exp().trace() - a.nrows() as f64).max(0.0)
}

/// `h(A)` together with its gradient `∇_A h = (e^A)ᵀ`.
pub fn acyclicity_with_gradient(a: &DMatrix<f64>) -> (f64, DMatrix<f64>) {
    let e = a.exp();
    let h = e.trace() - a.nrows() as f64;
    (h, e.transpose())
}
