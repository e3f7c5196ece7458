use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discretization::grid::{GridError, VoxelGrid};
use crate::discretization::volume::VolumeOptions;
use crate::field::solver::SolveOptions;
use crate::models::electrode::ElectrodeKind;
use crate::numerics::solver::LinearBackend;
use crate::numerics::{Convergence, ConvergenceMetric, Tolerance};
use crate::physics::bc::BoundaryMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to set up a [`crate::context::SimulationContext`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub grid: GridConfig,
    pub tissue: TissueConfig,
    pub electrode: ElectrodeConfig,
    pub solver: SolverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub dims: [usize; 3],
    /// Physical size of the box [mm].
    pub extent_mm: [f64; 3],
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            dims: [30, 30, 30],
            extent_mm: [20.0, 20.0, 20.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TissueConfig {
    pub seed: u64,
    pub heterogeneity: bool,
}

impl Default for TissueConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            heterogeneity: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectrodeConfig {
    pub kind: ElectrodeKind,
    /// Tip position [mm]; the centre of the grid when absent.
    pub tip: Option<[f64; 3]>,
    pub orientation: [f64; 3],
    pub seed: u64,
}

impl Default for ElectrodeConfig {
    fn default() -> Self {
        Self {
            kind: ElectrodeKind::Quadripolar,
            tip: None,
            orientation: [0.0, 0.0, 1.0],
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub boundary: BoundaryMode,
    pub backend: LinearBackend,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub max_iterations: usize,
    /// Wall-clock budget per linear solve; unlimited when absent.
    pub deadline_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let defaults = SolveOptions::default();
        let (abs_tolerance, rel_tolerance) = match defaults.convergence.tolerance {
            Tolerance::Combined(a, r) => (a, r),
            Tolerance::Absolute(a) => (a, 0.0),
            Tolerance::Relative(r) => (0.0, r),
        };
        Self {
            boundary: defaults.boundary,
            backend: defaults.backend,
            abs_tolerance,
            rel_tolerance,
            max_iterations: defaults.max_iterations,
            deadline_ms: None,
        }
    }
}

impl SolverConfig {
    /// Solve options for one solve started now.
    pub fn solve_options(&self) -> SolveOptions {
        let mut options = SolveOptions::with_boundary(self.boundary).backend(self.backend);
        options.convergence = Convergence {
            tolerance: Tolerance::Combined(self.abs_tolerance, self.rel_tolerance),
            metric: ConvergenceMetric::L2Norm,
        };
        options.max_iterations = self.max_iterations;
        if let Some(ms) = self.deadline_ms {
            options = options.deadline_in(Duration::from_millis(ms));
        }
        options
    }
}

impl SimulationConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_to_dir(&self, out_dir: &Path) -> Result<(), ConfigError> {
        let file = File::create(out_dir.join("config.json"))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.voxel_grid()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let o = DVec3::from_array(self.electrode.orientation);
        if !o.is_finite() || o.length_squared() == 0.0 {
            return Err(ConfigError::Invalid(format!(
                "electrode orientation must be non-zero, got {:?}",
                self.electrode.orientation
            )));
        }
        if let Some(tip) = self.electrode.tip {
            if tip.iter().any(|x| !x.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "electrode tip must be finite, got {tip:?}"
                )));
            }
        }

        let s = &self.solver;
        if !(s.abs_tolerance >= 0.0 && s.rel_tolerance >= 0.0) {
            return Err(ConfigError::Invalid(
                "solver tolerances must be non-negative".into(),
            ));
        }
        if s.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "solver max_iterations must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn voxel_grid(&self) -> Result<VoxelGrid, GridError> {
        VoxelGrid::new(self.grid.dims, self.grid.extent_mm)
    }

    pub fn volume_options(&self) -> VolumeOptions {
        VolumeOptions {
            heterogeneity: self.tissue.heterogeneity,
        }
    }

    /// Configured tip, or the centre of `grid`.
    pub fn electrode_tip(&self, grid: &VoxelGrid) -> DVec3 {
        match self.electrode.tip {
            Some(tip) => DVec3::from_array(tip),
            None => DVec3::from_array(grid.extent) * 0.5,
        }
    }
}
