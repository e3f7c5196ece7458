use glam::DVec3;
use nalgebra::DVector;
use serde::Serialize;

use crate::discretization::grid::VoxelGrid;

/// Dense scalar values co-indexed with a [`VoxelGrid`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarGrid {
    pub grid: VoxelGrid,
    pub data: Vec<f64>,
}

impl ScalarGrid {
    pub fn zeros(grid: VoxelGrid) -> Self {
        Self {
            grid,
            data: vec![0.0; grid.n_voxels()],
        }
    }

    /// # Panics
    /// If `data` does not hold one value per voxel.
    pub fn from_vec(grid: VoxelGrid, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), grid.n_voxels(), "one value per voxel");
        Self { grid, data }
    }

    pub fn from_dvector(grid: VoxelGrid, v: DVector<f64>) -> Self {
        Self::from_vec(grid, v.as_slice().to_vec())
    }

    /// Fill from a function of voxel indices.
    pub fn from_fn(grid: VoxelGrid, f: impl Fn(usize, usize, usize) -> f64) -> Self {
        let data = (0..grid.n_voxels())
            .map(|idx| {
                let (i, j, k) = grid.ijk(idx);
                f(i, j, k)
            })
            .collect();
        Self { grid, data }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.grid.idx(i, j, k)]
    }

    /// Value of the voxel enclosing `point` (mm), or `None` outside the grid.
    pub fn value_at(&self, point: DVec3) -> Option<f64> {
        self.grid.locate_index(point).map(|idx| self.data[idx])
    }

    /// Largest absolute value and the voxel holding it.
    pub fn max_abs(&self) -> (f64, (usize, usize, usize)) {
        let (idx, value) = self
            .data
            .iter()
            .enumerate()
            .fold((0, 0.0_f64), |(bi, bv), (i, v)| {
                if v.abs() > bv { (i, v.abs()) } else { (bi, bv) }
            });
        (value, self.grid.ijk(idx))
    }

    /// Values along one axis through voxel `(i, j, k)`.
    pub fn line(&self, axis: usize, i: usize, j: usize, k: usize) -> Vec<f64> {
        (0..self.grid.dims[axis])
            .map(|t| match axis {
                0 => self.get(t, j, k),
                1 => self.get(i, t, k),
                _ => self.get(i, j, t),
            })
            .collect()
    }

    /// Nested `[x][y][z]` arrays for export.
    pub fn to_nested(&self) -> Vec<Vec<Vec<f64>>> {
        let [nx, ny, nz] = self.grid.dims;
        (0..nx)
            .map(|i| {
                (0..ny)
                    .map(|j| {
                        let start = self.grid.idx(i, j, 0);
                        self.data[start..start + nz].to_vec()
                    })
                    .collect()
            })
            .collect()
    }
}

/// Three-component field on a [`VoxelGrid`], one grid per axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorGrid {
    pub x: ScalarGrid,
    pub y: ScalarGrid,
    pub z: ScalarGrid,
}

impl VectorGrid {
    pub fn grid(&self) -> &VoxelGrid {
        &self.x.grid
    }

    pub fn component(&self, axis: usize) -> &ScalarGrid {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> DVec3 {
        DVec3::new(self.x.get(i, j, k), self.y.get(i, j, k), self.z.get(i, j, k))
    }

    /// Euclidean norm per voxel.
    pub fn magnitude(&self) -> ScalarGrid {
        let data = self
            .x
            .data
            .iter()
            .zip(&self.y.data)
            .zip(&self.z.data)
            .map(|((x, y), z)| (x * x + y * y + z * z).sqrt())
            .collect();
        ScalarGrid::from_vec(*self.grid(), data)
    }
}
