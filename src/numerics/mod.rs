pub mod csr;
pub mod solver;
pub mod sparse;
pub mod timing;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nalgebra::DVector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    Absolute(f64),
    Relative(f64),
    Combined(f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceMetric {
    L2Norm,
    MaxNorm,
}

/// Residual-based stopping rule for the Krylov solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    pub tolerance: Tolerance,
    pub metric: ConvergenceMetric,
}

impl Default for Convergence {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::Combined(1e-30, 1e-10),
            metric: ConvergenceMetric::L2Norm,
        }
    }
}

impl Convergence {
    pub fn norm(&self, vector: &DVector<f64>) -> f64 {
        match self.metric {
            ConvergenceMetric::L2Norm => vector.norm(),
            ConvergenceMetric::MaxNorm => vector.amax(),
        }
    }

    pub fn check_tolerance(&self, norm: f64, initial_norm: f64) -> bool {
        match self.tolerance {
            Tolerance::Absolute(tol) => norm < tol,
            Tolerance::Relative(tol) => norm / initial_norm < tol,
            Tolerance::Combined(abs_tol, rel_tol) => {
                norm < abs_tol || (norm / initial_norm) < rel_tol
            }
        }
    }
}

/// Shared flag for abandoning a running solve from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Limits checked before and after a linear solve.
#[derive(Debug, Clone, Default)]
pub struct SolveControl {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelToken>,
}

impl SolveControl {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
