use log::debug;

use crate::discretization::volume::ConductivityVolume;
use crate::numerics::csr::CsrMatrix;

/// Assemble the seven-point discretisation of `div(sigma grad V)`.
///
/// Each existing axis neighbour contributes `(sigma_c + sigma_n) / 2 / h^2`
/// off the diagonal, with `h` the voxel spacing in metres along that axis;
/// the diagonal holds the negated row sum. Faces without a neighbour add no
/// term, which is the zero-flux condition on the outer boundary.
pub fn assemble_conductance(volume: &ConductivityVolume) -> CsrMatrix {
    let grid = volume.grid();
    let [nx, ny, nz] = grid.dims;
    let inv_h2 = grid.spacing_m().map(|h| 1.0 / (h * h));
    let n = grid.n_voxels();

    let mut row_ptr = Vec::with_capacity(n + 1);
    let mut col_idx = Vec::with_capacity(7 * n);
    let mut values = Vec::with_capacity(7 * n);
    row_ptr.push(0);

    // Neighbour columns are emitted in ascending flat-index order so each row
    // stays sorted: -x, -y, -z, centre, +z, +y, +x.
    let mut lower: Vec<(usize, f64)> = Vec::with_capacity(3);
    let mut upper: Vec<(usize, f64)> = Vec::with_capacity(3);

    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let idx = grid.idx(i, j, k);
                let sigma_c = volume.sigma(i, j, k);
                let face = |ni: usize, nj: usize, nk: usize, axis: usize| {
                    let col = grid.idx(ni, nj, nk);
                    let coeff = 0.5 * (sigma_c + volume.sigma(ni, nj, nk)) * inv_h2[axis];
                    (col, coeff)
                };

                lower.clear();
                upper.clear();
                if i > 0 {
                    lower.push(face(i - 1, j, k, 0));
                }
                if j > 0 {
                    lower.push(face(i, j - 1, k, 1));
                }
                if k > 0 {
                    lower.push(face(i, j, k - 1, 2));
                }
                if k + 1 < nz {
                    upper.push(face(i, j, k + 1, 2));
                }
                if j + 1 < ny {
                    upper.push(face(i, j + 1, k, 1));
                }
                if i + 1 < nx {
                    upper.push(face(i + 1, j, k, 0));
                }

                let mut centre = 0.0;
                for &(col, coeff) in lower.iter() {
                    col_idx.push(col);
                    values.push(coeff);
                    centre -= coeff;
                }
                let diag_pos = values.len();
                col_idx.push(idx);
                values.push(0.0);
                for &(col, coeff) in upper.iter() {
                    col_idx.push(col);
                    values.push(coeff);
                    centre -= coeff;
                }
                values[diag_pos] = centre;
                row_ptr.push(col_idx.len());
            }
        }
    }

    debug!(
        "assembled conductance operator: {} unknowns, {} non-zeros",
        n,
        values.len()
    );
    CsrMatrix::from_csr(n, row_ptr, col_idx, values)
}
