//! Owned simulation state: one tissue volume, its assembled solver and one
//! electrode, shared by every stimulation request.

use std::sync::{Arc, Mutex, MutexGuard};

use glam::DVec3;
use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, SimulationConfig};
use crate::discretization::grid::GridError;
use crate::discretization::volume::ConductivityVolume;
use crate::field::analyzer::{contact_voltages, derive_field};
use crate::field::grid::{ScalarGrid, VectorGrid};
use crate::field::solver::{FieldSolver, SolverCache};
use crate::models::electrode::{ElectrodeArray, ElectrodeError, GeometrySnapshot, StimulationMode};
use crate::physics::bc::BoundaryMode;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Electrode(#[from] ElectrodeError),
}

/// Result of one stimulation request.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSolution {
    /// Potential [V].
    pub potential: ScalarGrid,
    /// |E| [V/m].
    pub magnitude: ScalarGrid,
    pub field: VectorGrid,
    /// Potential at the node nearest each contact, in contact order.
    pub contact_voltages: Vec<f64>,
    pub electrode: GeometrySnapshot,
}

pub struct SimulationContext {
    config: SimulationConfig,
    volume: Arc<ConductivityVolume>,
    solvers: SolverCache,
    solver: Arc<FieldSolver>,
    electrode: Mutex<ElectrodeArray>,
}

impl SimulationContext {
    pub fn new(config: SimulationConfig) -> Result<Self, SetupError> {
        config.validate()?;
        let grid = config.voxel_grid()?;
        let volume = ConductivityVolume::build_with(
            grid.dims,
            grid.extent,
            config.tissue.seed,
            config.volume_options(),
        )?;
        Self::with_volume(config, volume)
    }

    /// Context over a caller-supplied volume. The grid section of `config` is
    /// ignored and a missing electrode tip defaults to the centre of `volume`.
    pub fn with_volume(
        config: SimulationConfig,
        volume: ConductivityVolume,
    ) -> Result<Self, SetupError> {
        let electrode = ElectrodeArray::build(
            config.electrode.kind,
            config.electrode_tip(volume.grid()),
            DVec3::from_array(config.electrode.orientation),
            config.electrode.seed,
        )?;

        let solvers = SolverCache::new();
        let solver = solvers.get_or_build(&volume);
        info!(
            "simulation context ready: {:?} voxels over {:?} mm, {:?} electrode at {:?}",
            volume.grid().dims,
            volume.grid().extent,
            electrode.kind(),
            electrode.tip()
        );

        Ok(Self {
            config,
            volume: Arc::new(volume),
            solvers,
            solver,
            electrode: Mutex::new(electrode),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn volume(&self) -> &Arc<ConductivityVolume> {
        &self.volume
    }

    pub fn solver(&self) -> &Arc<FieldSolver> {
        &self.solver
    }

    pub fn electrode_snapshot(&self) -> GeometrySnapshot {
        self.electrode().geometry_snapshot()
    }

    /// Replace the conductivity volume and reassemble its solver.
    pub fn replace_volume(&mut self, volume: ConductivityVolume) {
        self.solvers.evict(self.volume.id());
        self.solver = self.solvers.get_or_build(&volume);
        self.volume = Arc::new(volume);
    }

    /// Configure the electrode, solve for the potential and derive the field.
    ///
    /// `boundary` overrides the configured boundary mode for this request.
    pub fn stimulate(
        &self,
        mode: StimulationMode,
        active_contacts: &[usize],
        amplitudes: Option<&[f64]>,
        boundary: Option<BoundaryMode>,
    ) -> FieldSolution {
        let (sources, snapshot) = {
            let mut electrode = self.electrode();
            electrode.set_stimulation_configuration(mode, active_contacts, amplitudes);
            (electrode.active_sources(), electrode.geometry_snapshot())
        };

        let mut options = self.config.solver.solve_options();
        if let Some(boundary) = boundary {
            options.boundary = boundary;
        }
        let potential = self.solver.solve(&sources, &options);
        let (magnitude, field) = derive_field(&potential);
        let contact_voltages = contact_voltages(&potential, &snapshot);

        FieldSolution {
            potential,
            magnitude,
            field,
            contact_voltages,
            electrode: snapshot,
        }
    }

    fn electrode(&self) -> MutexGuard<'_, ElectrodeArray> {
        self.electrode.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::grid::VoxelGrid;

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.grid.dims = [8, 8, 8];
        config.grid.extent_mm = [16.0, 16.0, 16.0];
        config
    }

    #[test]
    fn stimulate_reports_configuration_and_field() {
        let ctx = SimulationContext::new(small_config()).unwrap();
        let solution = ctx.stimulate(StimulationMode::Monopolar, &[1, 9], Some(&[1.5][..]), None);

        assert_eq!(solution.electrode.active_contacts, vec![1]);
        assert_eq!(solution.electrode.amplitudes, vec![1.5]);
        assert_eq!(solution.contact_voltages.len(), 4);
        assert!(solution.potential.max_abs().0 > 0.0);
        assert!(solution.magnitude.data.iter().all(|&m| m >= 0.0));
        assert_eq!(ctx.solver().degraded_solves(), 0);
        assert_eq!(ctx.electrode_snapshot(), solution.electrode);
    }

    #[test]
    fn zero_amplitude_gives_zero_field() {
        let grid = VoxelGrid::cube(6, 12.0).unwrap();
        let ctx = SimulationContext::with_volume(
            SimulationConfig::default(),
            ConductivityVolume::uniform(grid, 0.33),
        )
        .unwrap();
        let solution = ctx.stimulate(
            StimulationMode::Multipolar,
            &[0, 2],
            Some(&[0.0, 0.0][..]),
            Some(BoundaryMode::ZeroPotential),
        );
        assert!(solution.potential.data.iter().all(|&v| v == 0.0));
        assert!(solution.magnitude.data.iter().all(|&m| m == 0.0));
        // default config box is 20 mm; the tip follows the supplied volume
        assert_eq!(solution.electrode.tip, [6.0, 6.0, 6.0]);
    }

    #[test]
    fn replacing_volume_reassembles_solver() {
        let mut ctx = SimulationContext::new(small_config()).unwrap();
        let old = ctx.solver().volume_id();
        let grid = *ctx.volume().grid();
        ctx.replace_volume(ConductivityVolume::uniform(grid, 0.2));
        assert_ne!(ctx.solver().volume_id(), old);
        assert_eq!(ctx.solver().volume_id(), ctx.volume().id());
    }
}
