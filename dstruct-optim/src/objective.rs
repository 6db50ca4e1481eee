use num_traits::Float;

/// Trait for optimization objectives.
///
/// Implementors provide function evaluation and gradient computation.
/// Methods take `&mut self` to allow caching, eval counting, and internal buffers.
pub trait Objective<F: Float> {
    /// Number of input variables.
    fn dim(&self) -> usize;

    /// Evaluate the objective and its gradient at `x`.
    ///
    /// Returns `(f(x), ∇f(x))`.
    fn eval_grad(&mut self, x: &[F]) -> (F, Vec<F>);
}

/// Adapter wrapping a closure `x -> (f(x), ∇f(x))` as an [`Objective`].
///
/// ```
/// use dstruct_optim::{FnObjective, Objective};
///
/// let mut obj = FnObjective::new(2, |x: &[f64]| {
///     (x[0] * x[0] + x[1] * x[1], vec![2.0 * x[0], 2.0 * x[1]])
/// });
/// let (f, g) = obj.eval_grad(&[1.0, 2.0]);
/// assert_eq!(f, 5.0);
/// assert_eq!(g, vec![2.0, 4.0]);
/// assert_eq!(obj.func_evals(), 1);
/// ```
pub struct FnObjective<G> {
    dim: usize,
    func: G,
    func_evals: usize,
}

impl<G> FnObjective<G> {
    /// Wrap `func`, which must return a gradient of length `dim`.
    pub fn new(dim: usize, func: G) -> Self {
        FnObjective {
            dim,
            func,
            func_evals: 0,
        }
    }

    /// Number of function evaluations performed so far.
    pub fn func_evals(&self) -> usize {
        self.func_evals
    }
}

impl<F: Float, G: FnMut(&[F]) -> (F, Vec<F>)> Objective<F> for FnObjective<G> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval_grad(&mut self, x: &[F]) -> (F, Vec<F>) {
        self.func_evals += 1;
        let (value, grad) = (self.func)(x);
        debug_assert_eq!(grad.len(), self.dim);
        (value, grad)
    }
}
