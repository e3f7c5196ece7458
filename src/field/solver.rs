use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glam::DVec3;
use log::{debug, warn};
use nalgebra::DVector;
use rayon::prelude::*;

use crate::discretization::grid::VoxelGrid;
use crate::discretization::volume::{ConductivityVolume, VolumeId};
use crate::field::grid::ScalarGrid;
use crate::models::electrode::CurrentSource;
use crate::numerics::csr::CsrMatrix;
use crate::numerics::solver::{DenseLuSolver, LinearBackend, LinearSolver, SolverError};
use crate::numerics::sparse::KrylovSolver;
use crate::numerics::timing::record_assembly;
use crate::numerics::{CancelToken, Convergence, SolveControl};
use crate::physics::bc::{BoundaryMode, apply_pins, pinned_voxels};
use crate::physics::operator::assemble_conductance;
use crate::physics::source::assemble_sources;

/// Per-call settings of a potential solve.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub boundary: BoundaryMode,
    pub backend: LinearBackend,
    pub convergence: Convergence,
    pub max_iterations: usize,
    pub control: SolveControl,
}

impl Default for SolveOptions {
    fn default() -> Self {
        let krylov = KrylovSolver::default();
        Self {
            boundary: BoundaryMode::default(),
            backend: LinearBackend::default(),
            convergence: krylov.convergence,
            max_iterations: krylov.max_iterations,
            control: SolveControl::default(),
        }
    }
}

impl SolveOptions {
    pub fn with_boundary(boundary: BoundaryMode) -> Self {
        Self {
            boundary,
            ..Self::default()
        }
    }

    pub fn backend(mut self, backend: LinearBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Give up on the linear solve once `budget` has elapsed from now.
    pub fn deadline_in(mut self, budget: Duration) -> Self {
        self.control.deadline = Some(Instant::now() + budget);
        self
    }

    pub fn cancel_with(mut self, token: CancelToken) -> Self {
        self.control.cancel = Some(token);
        self
    }
}

/// Potential grid plus diagnostics of the solve that produced it.
#[derive(Debug, Clone)]
pub struct PotentialSolution {
    pub potential: ScalarGrid,
    pub backend: LinearBackend,
    pub final_residual: f64,
    /// Sources that inject current: inside the grid and not on a voxel held at 0 V.
    pub sources_placed: usize,
    /// Voxel pinned to 0 V in natural mode.
    pub reference_voxel: Option<usize>,
}

/// Pinned, negated copy of the operator with its right-hand side.
struct PinnedSystem {
    matrix: CsrMatrix,
    rhs: DVector<f64>,
    placed: usize,
    reference_voxel: Option<usize>,
}

/// Finite-difference Poisson solver bound to one conductivity volume.
///
/// The conductance operator is assembled once in [`FieldSolver::build`] and
/// never mutated, so one solver can serve concurrent solves.
#[derive(Debug)]
pub struct FieldSolver {
    volume_id: VolumeId,
    grid: VoxelGrid,
    operator: Arc<CsrMatrix>,
    degraded: AtomicUsize,
}

impl FieldSolver {
    pub fn build(volume: &ConductivityVolume) -> Self {
        let operator = record_assembly(|| assemble_conductance(volume));
        Self {
            volume_id: volume.id(),
            grid: *volume.grid(),
            operator: Arc::new(operator),
            degraded: AtomicUsize::new(0),
        }
    }

    pub fn volume_id(&self) -> VolumeId {
        self.volume_id
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// The assembled operator, before any boundary pinning.
    pub fn operator(&self) -> &CsrMatrix {
        &self.operator
    }

    /// Number of solves that fell back to the zero potential.
    pub fn degraded_solves(&self) -> usize {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Solve for the potential, degrading to an all-zero grid on failure.
    ///
    /// Failures are logged and counted in [`FieldSolver::degraded_solves`].
    pub fn solve(&self, sources: &[CurrentSource], options: &SolveOptions) -> ScalarGrid {
        match self.try_solve(sources, options) {
            Ok(solution) => solution.potential,
            Err(e) => {
                self.degraded.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "potential solve failed ({}), returning zero potential on {:?} grid",
                    e, self.grid.dims
                );
                ScalarGrid::zeros(self.grid)
            }
        }
    }

    /// Positional form of [`FieldSolver::solve`]: positions in mm, amplitudes
    /// in mA, paired up to the shorter list.
    pub fn solve_at(
        &self,
        positions: &[DVec3],
        amplitudes_ma: &[f64],
        boundary: BoundaryMode,
    ) -> ScalarGrid {
        let sources: Vec<CurrentSource> = positions
            .iter()
            .zip(amplitudes_ma)
            .map(|(&p, &a)| CurrentSource::new(p, a))
            .collect();
        self.solve(&sources, &SolveOptions::with_boundary(boundary))
    }

    /// Solve independent stimuli in parallel on the rayon pool.
    pub fn solve_batch(
        &self,
        stimuli: &[Vec<CurrentSource>],
        options: &SolveOptions,
    ) -> Vec<ScalarGrid> {
        stimuli
            .par_iter()
            .map(|sources| self.solve(sources, options))
            .collect()
    }

    pub fn try_solve(
        &self,
        sources: &[CurrentSource],
        options: &SolveOptions,
    ) -> Result<PotentialSolution, SolverError> {
        let PinnedSystem {
            matrix,
            rhs,
            placed,
            reference_voxel,
        } = self.system(sources, options.boundary);
        let backend = options.backend.resolve(rhs.len());
        debug!(
            "solving {:?} system with {:?}: {} unknowns, {}/{} sources placed",
            options.boundary,
            backend,
            rhs.len(),
            placed,
            sources.len()
        );

        let result = match backend {
            LinearBackend::Krylov => KrylovSolver {
                convergence: options.convergence,
                max_iterations: options.max_iterations,
            }
            .solve(&matrix, &rhs, &options.control)?,
            _ => DenseLuSolver.solve(&matrix, &rhs, &options.control)?,
        };

        Ok(PotentialSolution {
            potential: ScalarGrid::from_dvector(self.grid, result.solution),
            backend,
            final_residual: result.final_residual,
            sources_placed: placed,
            reference_voxel,
        })
    }

    /// Per-solve copy of the system with boundary pins applied.
    ///
    /// Both sides are negated so the free block is positive definite; this
    /// leaves the solution of `div(sigma grad V) = S` unchanged. Sources on
    /// pinned voxels inject nothing and are not counted as placed.
    fn system(&self, sources: &[CurrentSource], boundary: BoundaryMode) -> PinnedSystem {
        let (mut rhs, placed) = assemble_sources(&self.grid, sources);
        let pinned = pinned_voxels(&self.grid, boundary, &rhs);

        let mut held = vec![false; rhs.len()];
        for &idx in &pinned {
            held[idx] = true;
        }
        let dropped = sources
            .iter()
            .filter(|s| self.grid.locate_index(s.position).is_some_and(|idx| held[idx]))
            .count();
        if dropped > 0 {
            warn!(
                "{} of {} sources sit on voxels held at 0 V in {:?} mode and inject no current",
                dropped,
                sources.len(),
                boundary
            );
        }

        let mut matrix = (*self.operator).clone();
        matrix.scale(-1.0);
        rhs *= -1.0;
        apply_pins(&mut matrix, &mut rhs, &pinned);
        PinnedSystem {
            matrix,
            rhs,
            placed: placed - dropped,
            reference_voxel: match boundary {
                BoundaryMode::Natural => pinned.first().copied(),
                BoundaryMode::ZeroPotential => None,
            },
        }
    }
}

/// Assembled solvers keyed by the identity of their volume.
#[derive(Debug, Default)]
pub struct SolverCache {
    solvers: Mutex<HashMap<VolumeId, Arc<FieldSolver>>>,
}

impl SolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached solver for `volume`, assembling it on first use.
    pub fn get_or_build(&self, volume: &ConductivityVolume) -> Arc<FieldSolver> {
        let mut solvers = self.solvers.lock().unwrap_or_else(|e| e.into_inner());
        solvers
            .entry(volume.id())
            .or_insert_with(|| {
                debug!("assembling field solver for volume {:?}", volume.id());
                Arc::new(FieldSolver::build(volume))
            })
            .clone()
    }

    pub fn evict(&self, id: VolumeId) -> Option<Arc<FieldSolver>> {
        self.solvers.lock().unwrap_or_else(|e| e.into_inner()).remove(&id)
    }

    pub fn len(&self) -> usize {
        self.solvers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
