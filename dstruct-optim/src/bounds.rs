//! Simple box constraints `lower <= x <= upper`.

use num_traits::Float;

/// Per-variable box constraints.
///
/// Infinite entries leave a side unconstrained; `lower[i] == upper[i]` pins
/// variable `i` to a constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds<F> {
    lower: Vec<F>,
    upper: Vec<F>,
}

impl<F: Float> Bounds<F> {
    /// No constraints on any of the `n` variables.
    pub fn unbounded(n: usize) -> Self {
        Bounds {
            lower: vec![F::neg_infinity(); n],
            upper: vec![F::infinity(); n],
        }
    }

    /// Build bounds from explicit lower and upper vectors.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ or if some `lower[i] > upper[i]`.
    pub fn new(lower: Vec<F>, upper: Vec<F>) -> Self {
        assert_eq!(
            lower.len(),
            upper.len(),
            "lower and upper bounds must have the same length"
        );
        assert!(
            lower.iter().zip(upper.iter()).all(|(&l, &u)| l <= u),
            "every lower bound must not exceed its upper bound"
        );
        Bounds { lower, upper }
    }

    /// Number of variables covered.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// True when no variables are covered.
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Lower bound of variable `i`.
    pub fn lower(&self, i: usize) -> F {
        self.lower[i]
    }

    /// Upper bound of variable `i`.
    pub fn upper(&self, i: usize) -> F {
        self.upper[i]
    }

    /// Set the bounds of variable `i`.
    pub fn set(&mut self, i: usize, lower: F, upper: F) {
        assert!(lower <= upper, "lower bound must not exceed upper bound");
        self.lower[i] = lower;
        self.upper[i] = upper;
    }

    /// Clamp `x` into the box in place.
    pub fn project(&self, x: &mut [F]) {
        debug_assert_eq!(x.len(), self.len());
        for (i, xi) in x.iter_mut().enumerate() {
            *xi = xi.max(self.lower[i]).min(self.upper[i]);
        }
    }

    /// True if every component of `x` lies inside the box.
    pub fn is_feasible(&self, x: &[F]) -> bool {
        x.iter()
            .enumerate()
            .all(|(i, &xi)| xi >= self.lower[i] && xi <= self.upper[i])
    }

    /// Whether variable `i` sits on a bound that the steepest-descent
    /// direction `-g_i` would leave.
    pub fn is_active(&self, i: usize, x_i: F, g_i: F) -> bool {
        (x_i <= self.lower[i] && g_i > F::zero()) || (x_i >= self.upper[i] && g_i < F::zero())
    }

    /// Projected gradient: components blocked by an active bound are zeroed.
    ///
    /// Its norm is the first-order stationarity measure for the box-constrained problem.
    pub fn projected_gradient(&self, x: &[F], g: &[F]) -> Vec<F> {
        x.iter()
            .zip(g.iter())
            .enumerate()
            .map(|(i, (&xi, &gi))| {
                if self.is_active(i, xi, gi) {
                    F::zero()
                } else {
                    gi
                }
            })
            .collect()
    }
}
