use glam::DVec3;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("grid dimensions must be positive, got {0:?}")]
    EmptyDimension([usize; 3]),
    #[error("physical extent must be finite and positive, got {0:?}")]
    InvalidExtent([f64; 3]),
}

/// Regular voxel grid over an axis-aligned box anchored at the origin.
///
/// Lengths are in millimetres. Voxel `(i, j, k)` covers
/// `[i*dx, (i+1)*dx) x [j*dy, (j+1)*dy) x [k*dz, (k+1)*dz)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoxelGrid {
    pub dims: [usize; 3],
    pub extent: [f64; 3],
    pub spacing: [f64; 3],
}

impl VoxelGrid {
    pub fn new(dims: [usize; 3], extent: [f64; 3]) -> Result<Self, GridError> {
        if dims.iter().any(|&n| n == 0) {
            return Err(GridError::EmptyDimension(dims));
        }
        if extent.iter().any(|&l| !(l.is_finite() && l > 0.0)) {
            return Err(GridError::InvalidExtent(extent));
        }
        let spacing = [
            extent[0] / dims[0] as f64,
            extent[1] / dims[1] as f64,
            extent[2] / dims[2] as f64,
        ];
        Ok(Self {
            dims,
            extent,
            spacing,
        })
    }

    /// Cube of `n` voxels per side over `length` mm.
    pub fn cube(n: usize, length: f64) -> Result<Self, GridError> {
        Self::new([n, n, n], [length, length, length])
    }

    #[inline]
    pub fn n_voxels(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Flat index of voxel `(i, j, k)`; x is the slowest axis.
    #[inline]
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.dims[0] && j < self.dims[1] && k < self.dims[2]);
        (i * self.dims[1] + j) * self.dims[2] + k
    }

    /// Inverse of [`VoxelGrid::idx`].
    #[inline]
    pub fn ijk(&self, idx: usize) -> (usize, usize, usize) {
        let k = idx % self.dims[2];
        let j = (idx / self.dims[2]) % self.dims[1];
        let i = idx / (self.dims[1] * self.dims[2]);
        (i, j, k)
    }

    /// Voxel enclosing a physical point (mm), by truncation.
    ///
    /// Returns `None` for points outside `[0, extent)` on any axis.
    pub fn locate(&self, point: DVec3) -> Option<(usize, usize, usize)> {
        let p = point.to_array();
        let mut out = [0usize; 3];
        for axis in 0..3 {
            let t = p[axis] / self.spacing[axis];
            // NaN falls through both comparisons
            if !(t >= 0.0 && t < self.dims[axis] as f64) {
                return None;
            }
            out[axis] = t as usize;
        }
        Some((out[0], out[1], out[2]))
    }

    pub fn locate_index(&self, point: DVec3) -> Option<usize> {
        self.locate(point).map(|(i, j, k)| self.idx(i, j, k))
    }

    /// True for voxels on any of the six outer faces.
    #[inline]
    pub fn is_boundary(&self, i: usize, j: usize, k: usize) -> bool {
        let [nx, ny, nz] = self.dims;
        i == 0 || j == 0 || k == 0 || i + 1 == nx || j + 1 == ny || k + 1 == nz
    }

    /// Voxel spacing converted to metres.
    pub fn spacing_m(&self) -> [f64; 3] {
        self.spacing.map(|h| h * 1e-3)
    }

    /// Voxel volume in cubic metres.
    pub fn voxel_volume_m3(&self) -> f64 {
        let [dx, dy, dz] = self.spacing_m();
        dx * dy * dz
    }

    /// Node coordinates along each axis, `linspace(0, L, n)` in mm.
    pub fn coordinates(&self) -> [Vec<f64>; 3] {
        std::array::from_fn(|axis| linspace(self.extent[axis], self.dims[axis]))
    }

    /// Index of the `linspace` node closest to `x` on an axis, clamped into the grid.
    pub fn nearest_node(&self, axis: usize, x: f64) -> usize {
        let n = self.dims[axis];
        if n == 1 || !x.is_finite() {
            return 0;
        }
        let step = self.extent[axis] / (n - 1) as f64;
        (x / step).round().clamp(0.0, (n - 1) as f64) as usize
    }
}

fn linspace(length: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![0.0];
    }
    let step = length / (n - 1) as f64;
    (0..n).map(|i| i as f64 * step).collect()
}
