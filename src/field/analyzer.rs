//! Quantities derived from a solved potential grid.

use glam::DVec3;

use crate::discretization::grid::VoxelGrid;
use crate::field::grid::{ScalarGrid, VectorGrid};
use crate::models::electrode::GeometrySnapshot;

/// `E = -grad V` [V/m] and its magnitude.
///
/// Interior voxels use central differences, the first and last voxel of each
/// line one-sided differences. An axis with a single voxel has no gradient.
pub fn derive_field(potential: &ScalarGrid) -> (ScalarGrid, VectorGrid) {
    let grid = potential.grid;
    let h = grid.spacing_m();
    let [x, y, z] = std::array::from_fn(|axis| {
        ScalarGrid::from_fn(grid, |i, j, k| -axis_derivative(potential, axis, h[axis], [i, j, k]))
    });
    let field = VectorGrid { x, y, z };
    (field.magnitude(), field)
}

fn axis_derivative(v: &ScalarGrid, axis: usize, h: f64, at: [usize; 3]) -> f64 {
    let n = v.grid.dims[axis];
    if n < 2 {
        return 0.0;
    }
    let shifted = |t: usize| {
        let mut p = at;
        p[axis] = t;
        v.get(p[0], p[1], p[2])
    };
    let t = at[axis];
    if t == 0 {
        (shifted(1) - shifted(0)) / h
    } else if t == n - 1 {
        (shifted(n - 1) - shifted(n - 2)) / h
    } else {
        (shifted(t + 1) - shifted(t - 1)) / (2.0 * h)
    }
}

/// Value of the voxel enclosing `point` (mm), 0.0 outside the grid.
pub fn sample_at(grid: &ScalarGrid, point: DVec3) -> f64 {
    grid.value_at(point).unwrap_or(0.0)
}

pub fn sample_many(grid: &ScalarGrid, points: &[DVec3]) -> Vec<f64> {
    points.iter().map(|&p| sample_at(grid, p)).collect()
}

/// Field magnitude [V/m] at each point, 0.0 outside the grid.
pub fn field_at_points(potential: &ScalarGrid, points: &[DVec3]) -> Vec<f64> {
    let (magnitude, _) = derive_field(potential);
    sample_many(&magnitude, points)
}

/// Potential at the grid node nearest each contact, in contact order.
///
/// Nodes sit at `linspace(0, L, n)` per axis; contacts off the grid read the
/// closest edge node.
pub fn contact_voltages(potential: &ScalarGrid, electrode: &GeometrySnapshot) -> Vec<f64> {
    let grid: &VoxelGrid = &potential.grid;
    electrode
        .contacts
        .iter()
        .map(|c| {
            let [i, j, k] = std::array::from_fn(|axis| grid.nearest_node(axis, c.position[axis]));
            potential.get(i, j, k)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::electrode::{ElectrodeArray, ElectrodeKind};
    use approx::assert_relative_eq;

    #[test]
    fn linear_ramp_gives_uniform_field() {
        for (dims, extent) in [([6, 4, 5], [12.0, 8.0, 5.0]), ([11, 3, 2], [5.5, 1.0, 1.0])] {
            let grid = VoxelGrid::new(dims, extent).unwrap();
            let c = 0.25;
            let ramp = ScalarGrid::from_fn(grid, |i, _, _| c * i as f64);
            let (magnitude, field) = derive_field(&ramp);
            let dx = grid.spacing_m()[0];
            for idx in 0..grid.n_voxels() {
                assert_relative_eq!(field.x.data[idx], -c / dx, max_relative = 1e-12);
                assert_eq!(field.y.data[idx], 0.0);
                assert_eq!(field.z.data[idx], 0.0);
                assert_relative_eq!(magnitude.data[idx], c / dx, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn single_voxel_axis_has_no_gradient() {
        let grid = VoxelGrid::new([4, 1, 1], [4.0, 1.0, 1.0]).unwrap();
        let v = ScalarGrid::from_vec(grid, vec![0.0, 1.0, 4.0, 9.0]);
        let (_, field) = derive_field(&v);
        // one-sided at the ends, central inside, h = 1e-3 m
        assert_relative_eq!(field.x.data[0], -1000.0, max_relative = 1e-12);
        assert_relative_eq!(field.x.data[1], -2000.0, max_relative = 1e-12);
        assert_relative_eq!(field.x.data[3], -5000.0, max_relative = 1e-12);
        assert!(field.y.data.iter().chain(&field.z.data).all(|&e| e == 0.0));
    }

    #[test]
    fn sampling_defaults_to_zero_outside() {
        let grid = VoxelGrid::cube(4, 8.0).unwrap();
        let v = ScalarGrid::from_fn(grid, |i, j, k| (i + j + k) as f64 + 1.0);
        let points = [
            DVec3::new(7.9, 0.0, 0.0),
            DVec3::new(-1.0, 1.0, 1.0),
            DVec3::new(3.0, 3.0, 8.0),
            DVec3::new(2.0, 2.0, 2.0),
        ];
        assert_eq!(sample_many(&v, &points), vec![4.0, 0.0, 0.0, 4.0]);
        assert_eq!(sample_at(&v, DVec3::new(1.0, 9.0, 1.0)), 0.0);
        assert_eq!(field_at_points(&v, &points)[1], 0.0);
    }

    #[test]
    fn contact_voltages_read_nearest_node() {
        let grid = VoxelGrid::cube(5, 20.0).unwrap();
        // nodes at 0, 5, 10, 15, 20 mm
        let v = ScalarGrid::from_fn(grid, |_, _, k| k as f64);
        let e = ElectrodeArray::build(
            ElectrodeKind::Quadripolar,
            DVec3::new(10.0, 10.0, 4.0),
            DVec3::Z,
            0,
        )
        .unwrap();
        // contacts at z = 4, 6, 8, 10
        let volts = contact_voltages(&v, &e.geometry_snapshot());
        assert_eq!(volts, vec![1.0, 1.0, 2.0, 2.0]);
    }
}
