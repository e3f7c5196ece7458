use nalgebra::DVector;

use crate::discretization::grid::VoxelGrid;
use crate::models::electrode::CurrentSource;

/// Volumetric current density [A/m^3] of point sources on the grid.
///
/// Each source lands in its enclosing voxel; several sources may share one.
/// Sources outside the grid are dropped. Returns the density vector and the
/// number of sources that were placed.
pub fn assemble_sources(grid: &VoxelGrid, sources: &[CurrentSource]) -> (DVector<f64>, usize) {
    let mut rhs = DVector::zeros(grid.n_voxels());
    let voxel_volume = grid.voxel_volume_m3();
    let mut placed = 0;
    for source in sources {
        let Some(idx) = grid.locate_index(source.position) else {
            continue;
        };
        rhs[idx] += source.amplitude * 1e-3 / voxel_volume;
        placed += 1;
    }
    (rhs, placed)
}
