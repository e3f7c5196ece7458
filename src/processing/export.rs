//! JSON payloads for downstream visualisation.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::context::FieldSolution;
use crate::discretization::volume::ConductivityVolume;
use crate::field::grid::ScalarGrid;
use crate::models::electrode::GeometrySnapshot;

/// Node coordinates [mm] and voxel properties as nested `[x][y][z]` arrays.
#[derive(Debug, Clone, Serialize)]
pub struct VolumePayload {
    pub coords: [Vec<f64>; 3],
    pub conductivity: Vec<Vec<Vec<f64>>>,
    /// 0 = CSF, 1 = white matter, 2 = gray matter.
    pub tissue_type: Vec<Vec<Vec<u8>>>,
}

impl VolumePayload {
    pub fn from_volume(volume: &ConductivityVolume) -> Self {
        let grid = *volume.grid();
        let conductivity = ScalarGrid::from_vec(grid, volume.conductivity().to_vec());
        let tissue = ScalarGrid::from_vec(
            grid,
            volume
                .tissue_classes()
                .iter()
                .map(|&c| c as u8 as f64)
                .collect(),
        );
        Self {
            coords: volume.coordinates(),
            conductivity: conductivity.to_nested(),
            tissue_type: nested_map(&tissue, |v| v as u8),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldPayload {
    pub coords: [Vec<f64>; 3],
    pub potential: Vec<Vec<Vec<f64>>>,
    pub field_magnitude: Vec<Vec<Vec<f64>>>,
    #[serde(rename = "Ex")]
    pub ex: Vec<Vec<Vec<f64>>>,
    #[serde(rename = "Ey")]
    pub ey: Vec<Vec<Vec<f64>>>,
    #[serde(rename = "Ez")]
    pub ez: Vec<Vec<Vec<f64>>>,
    pub contact_voltages: Vec<f64>,
}

impl FieldPayload {
    pub fn from_solution(solution: &FieldSolution) -> Self {
        Self {
            coords: solution.potential.grid.coordinates(),
            potential: solution.potential.to_nested(),
            field_magnitude: solution.magnitude.to_nested(),
            ex: solution.field.x.to_nested(),
            ey: solution.field.y.to_nested(),
            ez: solution.field.z.to_nested(),
            contact_voltages: solution.contact_voltages.clone(),
        }
    }
}

/// Everything a viewer needs for one stimulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationPayload {
    pub volume: VolumePayload,
    pub field: FieldPayload,
    pub electrode: GeometrySnapshot,
}

impl SimulationPayload {
    pub fn new(volume: &ConductivityVolume, solution: &FieldSolution) -> Self {
        Self {
            volume: VolumePayload::from_volume(volume),
            field: FieldPayload::from_solution(solution),
            electrode: solution.electrode.clone(),
        }
    }
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> std::io::Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, value)?;
    Ok(())
}

fn nested_map<T>(grid: &ScalarGrid, f: impl Fn(f64) -> T + Copy) -> Vec<Vec<Vec<T>>> {
    grid.to_nested()
        .into_iter()
        .map(|plane| {
            plane
                .into_iter()
                .map(|row| row.into_iter().map(f).collect())
                .collect()
        })
        .collect()
}
