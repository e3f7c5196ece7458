use nalgebra::{DMatrix, DVector};

/// Assembly-side storage for the conductance operator, in compressed sparse row form.
///
/// Column indices within a row are sorted ascending. Pinning and the dense
/// fallback work on this type; the Krylov path copies the arrays into `kryst`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Build from raw CSR arrays.
    ///
    /// # Panics
    /// If the arrays are inconsistent with an `n x n` matrix.
    pub fn from_csr(n: usize, row_ptr: Vec<usize>, col_idx: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(row_ptr.len(), n + 1, "row_ptr length");
        assert_eq!(col_idx.len(), values.len(), "col_idx/values length");
        assert_eq!(row_ptr[n], values.len(), "row_ptr tail");
        debug_assert!(col_idx.iter().all(|&c| c < n));
        Self {
            n,
            row_ptr,
            col_idx,
            values,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Column indices and values of one row.
    pub fn row(&self, row: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Entry `(row, col)`, zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (cols, vals) = self.row(row);
        cols.binary_search(&col).map_or(0.0, |pos| vals[pos])
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n).map(|r| self.get(r, r)).collect()
    }

    pub fn row_sum(&self, row: usize) -> f64 {
        self.row(row).1.iter().sum()
    }

    /// Turn `row` into an identity row: off-diagonals zero, diagonal one.
    ///
    /// The diagonal must be stored; every assembled operator stores it.
    fn pin_row(&mut self, row: usize) {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        for pos in start..end {
            self.values[pos] = if self.col_idx[pos] == row { 1.0 } else { 0.0 };
        }
    }

    /// Decouple `row` from the system: identity row and zeroed column.
    ///
    /// Only valid for unknowns held at zero, on a structurally symmetric
    /// matrix. Symmetry of the remaining block is preserved.
    pub fn pin_symmetric(&mut self, row: usize) {
        for pos in self.row_ptr[row]..self.row_ptr[row + 1] {
            let col = self.col_idx[pos];
            if col == row {
                continue;
            }
            let start = self.row_ptr[col];
            let end = self.row_ptr[col + 1];
            if let Ok(offset) = self.col_idx[start..end].binary_search(&row) {
                self.values[start + offset] = 0.0;
            }
        }
        self.pin_row(row);
    }

    /// Multiply every stored entry by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.values {
            *v *= factor;
        }
    }

    /// `y = A x`
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        debug_assert_eq!(x.len(), self.n);
        DVector::from_iterator(
            self.n,
            (0..self.n).map(|r| {
                let (cols, vals) = self.row(r);
                cols.iter().zip(vals).map(|(&c, &v)| v * x[c]).sum::<f64>()
            }),
        )
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(self.n, self.n);
        for r in 0..self.n {
            let (cols, vals) = self.row(r);
            for (&c, &v) in cols.iter().zip(vals) {
                m[(r, c)] += v;
            }
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // [ 2 -1  0 ]
    // [-1  2 -1 ]
    // [ 0 -1  2 ]
    fn tridiag() -> CsrMatrix {
        CsrMatrix::from_csr(
            3,
            vec![0, 2, 5, 7],
            vec![0, 1, 0, 1, 2, 1, 2],
            vec![2.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0],
        )
    }

    #[test]
    fn product_and_lookup() {
        let a = tridiag();
        let y = a.mul_vec(&DVector::from_vec(vec![1.0, 2.0, 3.0]));
        assert_eq!(y.as_slice(), &[0.0, 0.0, 4.0]);
        assert_eq!(a.get(0, 2), 0.0);
        assert_eq!(a.get(2, 1), -1.0);
        assert_eq!(a.diagonal(), vec![2.0, 2.0, 2.0]);
        assert_eq!(a.row_sum(1), 0.0);
        assert_eq!(a.to_dense()[(1, 0)], -1.0);
    }

    #[test]
    fn pinning_leaves_identity_row() {
        let mut a = tridiag();
        a.pin_row(1);
        assert_eq!(a.row(1).1, &[0.0, 1.0, 0.0]);
        assert_eq!(a.get(0, 1), -1.0);

        let mut b = tridiag();
        b.pin_symmetric(1);
        assert_eq!(b.row(1).1, &[0.0, 1.0, 0.0]);
        assert_eq!(b.get(0, 1), 0.0);
        assert_eq!(b.get(2, 1), 0.0);
        assert_eq!(b.get(0, 0), 2.0);
    }
}
