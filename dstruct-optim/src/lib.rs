//! Inner minimization for the dual-ascent structure learners.
//!
//! A small box-constrained quasi-Newton toolkit: an [`Objective`] contract,
//! per-variable [`Bounds`], a projected Armijo line search and the
//! [`lbfgsb`] solver.

pub mod bounds;
pub mod convergence;
pub mod line_search;
pub mod objective;
pub mod result;
pub mod solvers;

pub use bounds::Bounds;
pub use convergence::ConvergenceParams;
pub use line_search::ArmijoParams;
pub use objective::{FnObjective, Objective};
pub use result::{OptimResult, TerminationReason};
pub use solvers::lbfgsb::{lbfgsb, LbfgsbConfig};
