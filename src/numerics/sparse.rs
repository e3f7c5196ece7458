use std::sync::Arc;

use kryst::solver::LinearSolver as _;
use kryst::{
    parallel::{NoComm, UniverseComm},
    preconditioner::PcSide,
};
use log::debug;
use nalgebra::DVector;

use crate::numerics::csr::CsrMatrix;
use crate::numerics::solver::{LinearSolver, SolverError, SolverResult, check_dims};
use crate::numerics::timing::record_linear_solve;
use crate::numerics::{Convergence, SolveControl, Tolerance};

/// Factor by which the recomputed residual may exceed the Krylov stopping test.
const RESIDUAL_SLACK: f64 = 1e3;

/// Jacobi row-scaled BiCGStab from `kryst`.
///
/// Rows are divided by their diagonal before the system is handed over, and
/// the right-hand side with them. Once `kryst` returns, the scaled residual
/// is recomputed from the assembled matrix and checked against
/// `convergence`, loosened by [`RESIDUAL_SLACK`]. Deadline and cancellation
/// are checked before and after the Krylov call.
#[derive(Debug, Clone)]
pub struct KrylovSolver {
    pub convergence: Convergence,
    pub max_iterations: usize,
}

impl Default for KrylovSolver {
    fn default() -> Self {
        Self {
            convergence: Convergence::default(),
            max_iterations: 10_000,
        }
    }
}

impl KrylovSolver {
    /// Relative tolerance passed to `kryst` for a scaled right-hand side of norm `b_norm`.
    fn linear_tol(&self, b_norm: f64) -> f64 {
        match self.convergence.tolerance {
            Tolerance::Relative(rel) => rel,
            Tolerance::Absolute(abs) => abs / b_norm,
            Tolerance::Combined(abs, rel) => rel.max(abs / b_norm),
        }
    }
}

impl LinearSolver for KrylovSolver {
    fn solve(
        &self,
        matrix: &CsrMatrix,
        rhs: &DVector<f64>,
        control: &SolveControl,
    ) -> Result<SolverResult, SolverError> {
        check_dims(matrix, rhs)?;
        let n = matrix.n();
        if control.is_cancelled() {
            return Err(SolverError::Cancelled);
        }
        if control.is_expired() {
            return Err(SolverError::DeadlineExceeded);
        }
        if rhs.iter().all(|&v| v == 0.0) {
            return Ok(SolverResult {
                solution: DVector::zeros(n),
                final_residual: 0.0,
            });
        }

        let d: Vec<f64> = matrix
            .diagonal()
            .into_iter()
            .map(|diag| if diag.abs() < 1e-12 { 1.0 } else { diag })
            .collect();

        let mut scaled = kryst::matrix::sparse::CsrMatrix::from_csr(
            n,
            n,
            matrix.row_ptr().to_vec(),
            matrix.col_idx().to_vec(),
            matrix.values().to_vec(),
        );
        for (row_idx, &diag) in d.iter().enumerate() {
            let scale = 1.0 / diag;
            for val in scaled.row_values_mut(row_idx).iter_mut() {
                *val *= scale;
            }
        }
        let op = kryst::matrix::op::CsrOp::new(Arc::new(scaled));

        let b: DVector<f64> = DVector::from_iterator(n, (0..n).map(|idx| rhs[idx] / d[idx]));
        let b_norm = self.convergence.norm(&b);
        let linear_tol = self.linear_tol(b_norm);

        let mut bicgstab_solver =
            kryst::solver::bicgstab::BiCgStabSolver::new(linear_tol, self.max_iterations);
        let mut workspace = kryst::context::ksp_context::Workspace::new(n);
        bicgstab_solver.setup_workspace(&mut workspace);

        let mut x = DVector::from_element(n, 0.0);
        let result = record_linear_solve(|| {
            bicgstab_solver.solve(
                &op,
                None,
                b.as_slice(),
                x.as_mut_slice(),
                PcSide::Left,
                &UniverseComm::NoComm(NoComm {}),
                None,
                Some(&mut workspace),
            )
        });

        match result {
            Ok(stats) => debug!("BiCGStab on {} unknowns (tol {:.1e}): {:?}", n, linear_tol, stats),
            Err(e) => {
                debug!("BiCGStab on {} unknowns failed: {:?}", n, e);
                return Err(SolverError::LinearSolveFailed(format!("{:?}", e)));
            }
        }

        if control.is_cancelled() {
            return Err(SolverError::Cancelled);
        }
        if control.is_expired() {
            return Err(SolverError::DeadlineExceeded);
        }
        if !x.iter().all(|v| v.is_finite()) {
            return Err(SolverError::NonFinite);
        }

        let mut residual = rhs - matrix.mul_vec(&x);
        for (r, diag) in residual.iter_mut().zip(&d) {
            *r /= diag;
        }
        let final_residual = self.convergence.norm(&residual);
        if !self.convergence.check_tolerance(final_residual / RESIDUAL_SLACK, b_norm) {
            return Err(SolverError::NonConvergence {
                residual: final_residual,
            });
        }

        Ok(SolverResult {
            solution: x,
            final_residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::CancelToken;
    use crate::numerics::solver::DenseLuSolver;
    use approx::assert_relative_eq;
    use std::time::Instant;

    /// 1D Laplacian with both end unknowns held at zero.
    fn pinned_laplacian(n: usize) -> CsrMatrix {
        let mut row_ptr = vec![0];
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for r in 0..n {
            if r > 0 {
                cols.push(r - 1);
                vals.push(-1.0);
            }
            cols.push(r);
            vals.push(2.0);
            if r + 1 < n {
                cols.push(r + 1);
                vals.push(-1.0);
            }
            row_ptr.push(cols.len());
        }
        let mut a = CsrMatrix::from_csr(n, row_ptr, cols, vals);
        a.pin_symmetric(0);
        a.pin_symmetric(n - 1);
        a
    }

    fn interior_ones(n: usize) -> DVector<f64> {
        let mut b = DVector::from_element(n, 1.0);
        b[0] = 0.0;
        b[n - 1] = 0.0;
        b
    }

    #[test]
    fn matches_dense_solution() {
        let a = pinned_laplacian(40);
        let b = interior_ones(40);
        let control = SolveControl::default();
        let krylov = KrylovSolver::default().solve(&a, &b, &control).unwrap();
        let lu = DenseLuSolver.solve(&a, &b, &control).unwrap();
        assert_eq!(krylov.solution[0], 0.0);
        assert_eq!(krylov.solution[39], 0.0);
        for (x, y) in krylov.solution.iter().zip(lu.solution.iter()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-6);
        }
    }

    #[test]
    fn zero_rhs_returns_exact_zero() {
        let a = pinned_laplacian(10);
        let b = DVector::zeros(10);
        let r = KrylovSolver::default().solve(&a, &b, &SolveControl::default()).unwrap();
        assert_eq!(r.final_residual, 0.0);
        assert!(r.solution.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn honours_cancellation_and_deadline() {
        let a = pinned_laplacian(200);
        let b = interior_ones(200);

        let token = CancelToken::new();
        token.cancel();
        let cancelled = SolveControl {
            deadline: None,
            cancel: Some(token),
        };
        let err = KrylovSolver::default().solve(&a, &b, &cancelled).unwrap_err();
        assert_eq!(err, SolverError::Cancelled);

        let expired = SolveControl {
            deadline: Some(Instant::now()),
            cancel: None,
        };
        let err = KrylovSolver::default().solve(&a, &b, &expired).unwrap_err();
        assert_eq!(err, SolverError::DeadlineExceeded);
    }

    #[test]
    fn iteration_cap_is_an_error() {
        let a = pinned_laplacian(200);
        let b = interior_ones(200);
        let capped = KrylovSolver {
            convergence: Convergence {
                tolerance: Tolerance::Relative(1e-12),
                ..Convergence::default()
            },
            max_iterations: 2,
        };
        let err = capped.solve(&a, &b, &SolveControl::default()).unwrap_err();
        assert!(matches!(
            err,
            SolverError::NonConvergence { .. } | SolverError::LinearSolveFailed(_)
        ));
    }

    #[test]
    fn absolute_tolerance_maps_to_relative() {
        let solver = KrylovSolver {
            convergence: Convergence {
                tolerance: Tolerance::Combined(1e-6, 1e-10),
                ..Convergence::default()
            },
            max_iterations: 10,
        };
        assert_eq!(solver.linear_tol(1.0), 1e-6);
        assert_eq!(solver.linear_tol(1e6), 1e-10);
    }
}
