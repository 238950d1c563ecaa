use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Reduction axis for [`sum_axis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Collapse the rows: result is `1 x cols`.
    Rows,
    /// Collapse the columns: result is `rows x 1`.
    Cols,
}

/// Standard `(m x k) . (k x n)` product.
///
/// Output rows are computed in parallel; each worker writes only its own row.
pub fn matmul(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.cols() != b.rows() {
        return Err(Error::dimension(
            "matmul",
            format!("cols of A ({}) != rows of B ({})", a.cols(), b.rows()),
        ));
    }

    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let lhs = a.as_slice();
    let rhs = b.as_slice();
    let mut out = vec![0.0; m * n];

    out.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        let a_row = &lhs[i * k..(i + 1) * k];
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = a_row.iter()
                .enumerate()
                .map(|(p, &x)| x * rhs[p * n + j])
                .sum();
        }
    });

    Ok(Matrix::from_parts(m, n, out))
}

pub fn transpose(matrix: &Matrix) -> Matrix {
    let (rows, cols) = matrix.shape();
    let src = matrix.as_slice();
    let mut out = vec![0.0; rows * cols];

    out.par_chunks_mut(rows).enumerate().for_each(|(j, out_row)| {
        for (i, cell) in out_row.iter_mut().enumerate() {
            *cell = src[i * cols + j];
        }
    });

    Matrix::from_parts(cols, rows, out)
}

/// Sums along `axis`, keeping the result 2-D.
pub fn sum_axis(matrix: &Matrix, axis: Axis) -> Matrix {
    let (rows, cols) = matrix.shape();
    match axis {
        Axis::Rows => {
            let mut out = vec![0.0; cols];
            for row in matrix.row_slices() {
                for (acc, &x) in out.iter_mut().zip(row) {
                    *acc += x;
                }
            }
            Matrix::from_parts(1, cols, out)
        }
        Axis::Cols => {
            let out = matrix.row_slices().map(|row| row.iter().sum()).collect();
            Matrix::from_parts(rows, 1, out)
        }
    }
}

/// `n x n` identity matrix.
pub fn identity(n: usize) -> Result<Matrix> {
    let mut out = Matrix::zeros(n, n)?;
    for i in 0..n {
        out.as_mut_slice()[i * n + i] = 1.0;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn matmul_contracts_inner_dimension() {
        let a = Matrix::from_data(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let b = Matrix::from_data(vec![vec![7.0, 8.0], vec![9.0, 10.0], vec![11.0, 12.0]]).unwrap();
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn matmul_rejects_bad_inner_dimension() {
        let a = Matrix::zeros(2, 3).unwrap();
        let b = Matrix::zeros(2, 3).unwrap();
        assert!(matches!(matmul(&a, &b), Err(Error::Dimension { .. })));
    }

    #[test]
    fn matmul_with_identity_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(3);
        for (rows, cols) in [(1, 1), (2, 5), (7, 3)] {
            let a = Matrix::xavier(rows, cols, &mut rng).unwrap();
            assert_eq!(matmul(&a, &identity(cols).unwrap()).unwrap(), a);
        }
    }

    #[test]
    fn transpose_twice_is_identity() {
        let mut rng = StdRng::seed_from_u64(11);
        for (rows, cols) in [(1, 4), (3, 3), (5, 2)] {
            let a = Matrix::xavier(rows, cols, &mut rng).unwrap();
            let t = transpose(&a);
            assert_eq!(t.shape(), (cols, rows));
            assert_eq!(t.get(0, rows - 1).unwrap(), a.get(rows - 1, 0).unwrap());
            assert_eq!(transpose(&t), a);
        }
    }

    #[test]
    fn sums_along_each_axis() {
        let a = Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let rows = sum_axis(&a, Axis::Rows);
        assert_eq!(rows.shape(), (1, 2));
        assert_eq!(rows.as_slice(), &[9.0, 12.0]);

        let cols = sum_axis(&a, Axis::Cols);
        assert_eq!(cols.shape(), (3, 1));
        assert_eq!(cols.as_slice(), &[3.0, 7.0, 11.0]);
    }
}
