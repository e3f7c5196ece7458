use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::discretization::grid::VoxelGrid;
use crate::numerics::csr::CsrMatrix;

/// Default reference voxel held at 0 V in [`BoundaryMode::Natural`].
pub const REFERENCE_VOXEL: usize = 0;

/// Treatment of the outer faces of the volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    /// Zero flux through the outer faces, as assembled.
    ///
    /// The pure Neumann operator is singular up to a constant, so one
    /// source-free reference voxel is pinned to 0 V (see [`reference_voxel`]).
    /// It also absorbs any net injected current.
    #[default]
    Natural,
    /// Every voxel on the six outer faces is held at 0 V.
    ZeroPotential,
}

/// Voxel pinned to 0 V in natural mode for the source density `rhs`.
///
/// [`REFERENCE_VOXEL`] unless a source lands there. Otherwise the grid corner
/// farthest from every source that carries none itself, then the first
/// source-free voxel. When every voxel carries a source the default is kept.
pub fn reference_voxel(grid: &VoxelGrid, rhs: &DVector<f64>) -> usize {
    if rhs[REFERENCE_VOXEL] == 0.0 {
        return REFERENCE_VOXEL;
    }
    let sources: Vec<(usize, usize, usize)> = (0..grid.n_voxels())
        .filter(|&idx| rhs[idx] != 0.0)
        .map(|idx| grid.ijk(idx))
        .collect();
    let clearance = |(i, j, k): (usize, usize, usize)| {
        sources
            .iter()
            .map(|&(a, b, c)| i.abs_diff(a).pow(2) + j.abs_diff(b).pow(2) + k.abs_diff(c).pow(2))
            .min()
            .unwrap_or(usize::MAX)
    };

    let [nx, ny, nz] = grid.dims;
    let mut corners = Vec::with_capacity(8);
    for i in [0, nx - 1] {
        for j in [0, ny - 1] {
            for k in [0, nz - 1] {
                corners.push((i, j, k));
            }
        }
    }
    corners
        .into_iter()
        .filter(|&(i, j, k)| rhs[grid.idx(i, j, k)] == 0.0)
        .max_by_key(|&corner| clearance(corner))
        .map(|(i, j, k)| grid.idx(i, j, k))
        .or_else(|| (0..grid.n_voxels()).find(|&idx| rhs[idx] == 0.0))
        .unwrap_or(REFERENCE_VOXEL)
}

/// Flat indices of the voxels held at 0 V for the source density `rhs`.
pub fn pinned_voxels(grid: &VoxelGrid, mode: BoundaryMode, rhs: &DVector<f64>) -> Vec<usize> {
    match mode {
        BoundaryMode::Natural => vec![reference_voxel(grid, rhs)],
        BoundaryMode::ZeroPotential => (0..grid.n_voxels())
            .filter(|&idx| {
                let (i, j, k) = grid.ijk(idx);
                grid.is_boundary(i, j, k)
            })
            .collect(),
    }
}

/// Hold `pinned` voxels at 0 V: identity row, zeroed column, zero right-hand side.
///
/// With the pinned values at zero the column terms carry nothing to the
/// right-hand side, and the free block keeps the operator's symmetry.
pub fn apply_pins(matrix: &mut CsrMatrix, rhs: &mut DVector<f64>, pinned: &[usize]) {
    for &idx in pinned {
        matrix.pin_symmetric(idx);
        rhs[idx] = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_potential_pins_every_face_voxel() {
        let grid = VoxelGrid::cube(5, 10.0).unwrap();
        let rhs = DVector::zeros(grid.n_voxels());
        let pinned = pinned_voxels(&grid, BoundaryMode::ZeroPotential, &rhs);
        // 5^3 - 3^3 shell voxels
        assert_eq!(pinned.len(), 125 - 27);
        assert!(!pinned.contains(&grid.idx(2, 2, 2)));
        assert!(pinned.contains(&grid.idx(4, 2, 2)));
        assert_eq!(pinned_voxels(&grid, BoundaryMode::Natural, &rhs), vec![0]);
    }

    #[test]
    fn reference_moves_off_a_source() {
        let grid = VoxelGrid::cube(6, 6.0).unwrap();
        let mut rhs = DVector::zeros(grid.n_voxels());
        rhs[grid.idx(3, 3, 3)] = 1.0;
        assert_eq!(reference_voxel(&grid, &rhs), REFERENCE_VOXEL);

        let mut rhs = DVector::zeros(grid.n_voxels());
        rhs[0] = 1.0;
        assert_eq!(reference_voxel(&grid, &rhs), grid.idx(5, 5, 5));

        rhs[grid.idx(5, 5, 5)] = 1.0;
        rhs[grid.idx(3, 3, 3)] = 1.0;
        let r = reference_voxel(&grid, &rhs);
        assert_eq!(rhs[r], 0.0);
        let (i, j, k) = grid.ijk(r);
        assert!([i, j, k].iter().all(|&c| c == 0 || c == 5));
    }

    #[test]
    fn saturated_grid_keeps_default_reference() {
        let grid = VoxelGrid::new([2, 1, 1], [2.0, 1.0, 1.0]).unwrap();
        let rhs = DVector::from_element(2, 1.0);
        assert_eq!(reference_voxel(&grid, &rhs), REFERENCE_VOXEL);
        let mut rhs = rhs;
        rhs[1] = 0.0;
        assert_eq!(reference_voxel(&grid, &rhs), 1);
    }

    #[test]
    fn pins_decouple_voxels() {
        use crate::discretization::volume::ConductivityVolume;
        use crate::physics::operator::assemble_conductance;

        let grid = VoxelGrid::cube(4, 8.0).unwrap();
        let mut a = assemble_conductance(&ConductivityVolume::uniform(grid, 0.3));
        let mut rhs = DVector::from_element(grid.n_voxels(), 1.0);
        let pinned = pinned_voxels(&grid, BoundaryMode::ZeroPotential, &rhs);
        apply_pins(&mut a, &mut rhs, &pinned);

        for &p in &pinned {
            assert_eq!(rhs[p], 0.0);
            assert_eq!(a.get(p, p), 1.0);
            let (cols, vals) = a.row(p);
            for (&c, &v) in cols.iter().zip(vals) {
                if c != p {
                    assert_eq!(v, 0.0);
                    assert_eq!(a.get(c, p), 0.0);
                }
            }
        }
        let inner = grid.idx(1, 1, 1);
        assert_eq!(rhs[inner], 1.0);
        assert!(a.get(inner, grid.idx(1, 1, 2)) > 0.0);
    }

    #[test]
    fn thin_grids_are_all_boundary() {
        let grid = VoxelGrid::new([4, 2, 4], [1.0; 3]).unwrap();
        let rhs = DVector::zeros(grid.n_voxels());
        assert_eq!(pinned_voxels(&grid, BoundaryMode::ZeroPotential, &rhs).len(), 32);
    }
}
