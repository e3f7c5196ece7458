use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::numerics::SolveControl;
use crate::numerics::csr::CsrMatrix;
use crate::numerics::timing::record_linear_solve;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("system matrix is singular")]
    Singular,
    #[error("linear solve produced NaN or Inf")]
    NonFinite,
    #[error("no convergence (scaled residual {residual:.3e})")]
    NonConvergence { residual: f64 },
    #[error("Krylov solve failed: {0}")]
    LinearSolveFailed(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("solve cancelled")]
    Cancelled,
    #[error("dimension mismatch: matrix has {expected} rows, right-hand side {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone)]
pub struct SolverResult {
    pub solution: DVector<f64>,
    pub final_residual: f64,
}

/// Solves `A x = b` for an assembled sparse system.
pub trait LinearSolver {
    fn solve(
        &self,
        matrix: &CsrMatrix,
        rhs: &DVector<f64>,
        control: &SolveControl,
    ) -> Result<SolverResult, SolverError>;
}

/// Which linear solver handles a field solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearBackend {
    /// Dense LU up to [`DENSE_LIMIT`] unknowns, BiCGStab above.
    #[default]
    Auto,
    DenseLu,
    /// Jacobi-scaled BiCGStab from `kryst`.
    Krylov,
}

/// Largest system routed to the dense factorisation by [`LinearBackend::Auto`].
pub const DENSE_LIMIT: usize = 512;

impl LinearBackend {
    pub fn resolve(self, unknowns: usize) -> LinearBackend {
        match self {
            LinearBackend::Auto if unknowns <= DENSE_LIMIT => LinearBackend::DenseLu,
            LinearBackend::Auto => LinearBackend::Krylov,
            other => other,
        }
    }
}

/// Direct solve through a dense LU factorisation.
///
/// Memory grows with the square of the unknown count; meant for small grids
/// and for cross-checking the iterative path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLuSolver;

impl LinearSolver for DenseLuSolver {
    fn solve(
        &self,
        matrix: &CsrMatrix,
        rhs: &DVector<f64>,
        control: &SolveControl,
    ) -> Result<SolverResult, SolverError> {
        check_dims(matrix, rhs)?;
        if control.is_cancelled() {
            return Err(SolverError::Cancelled);
        }

        let dense = matrix.to_dense();
        let solution = record_linear_solve(|| dense.lu().solve(rhs)).ok_or(SolverError::Singular)?;
        if !solution.iter().all(|v| v.is_finite()) {
            return Err(SolverError::NonFinite);
        }
        if control.is_expired() {
            return Err(SolverError::DeadlineExceeded);
        }

        let final_residual = (rhs - matrix.mul_vec(&solution)).norm();
        debug!("dense LU solve: {} unknowns, residual {:.3e}", rhs.len(), final_residual);
        Ok(SolverResult {
            solution,
            final_residual,
        })
    }
}

pub(crate) fn check_dims(matrix: &CsrMatrix, rhs: &DVector<f64>) -> Result<(), SolverError> {
    if matrix.n() != rhs.len() {
        return Err(SolverError::DimensionMismatch {
            expected: matrix.n(),
            got: rhs.len(),
        });
    }
    if !rhs.iter().all(|v| v.is_finite()) {
        return Err(SolverError::NonFinite);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tridiag() -> CsrMatrix {
        CsrMatrix::from_csr(
            3,
            vec![0, 2, 5, 7],
            vec![0, 1, 0, 1, 2, 1, 2],
            vec![2.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0],
        )
    }

    #[test]
    fn dense_solves_small_system() {
        let b = DVector::from_vec(vec![1.0, 0.0, 1.0]);
        let r = DenseLuSolver.solve(&tridiag(), &b, &SolveControl::default()).unwrap();
        for v in r.solution.iter() {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-12);
        }
        assert!(r.final_residual < 1e-12);
    }

    #[test]
    fn dense_reports_singular_matrix() {
        // rows sum to zero: constant vector in the nullspace
        let a = CsrMatrix::from_csr(
            2,
            vec![0, 2, 4],
            vec![0, 1, 0, 1],
            vec![-1.0, 1.0, 1.0, -1.0],
        );
        let b = DVector::from_vec(vec![1.0, 0.0]);
        let err = DenseLuSolver.solve(&a, &b, &SolveControl::default()).unwrap_err();
        assert!(matches!(err, SolverError::Singular | SolverError::NonFinite));
    }

    #[test]
    fn rejects_mismatched_rhs() {
        let b = DVector::from_vec(vec![1.0, 0.0]);
        assert_eq!(
            DenseLuSolver.solve(&tridiag(), &b, &SolveControl::default()).unwrap_err(),
            SolverError::DimensionMismatch { expected: 3, got: 2 }
        );
    }

    #[test]
    fn auto_backend_switches_on_size() {
        assert_eq!(LinearBackend::Auto.resolve(100), LinearBackend::DenseLu);
        assert_eq!(LinearBackend::Auto.resolve(1000), LinearBackend::Krylov);
        assert_eq!(LinearBackend::DenseLu.resolve(1_000_000), LinearBackend::DenseLu);
    }
}
