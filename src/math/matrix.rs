use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use crate::error::{Error, Result};

/// Dense row-major 2-D table of `f64`.
///
/// The shape is fixed at construction; the contents are mutable. Every
/// arithmetic method returns a freshly allocated matrix, so two matrices never
/// share a buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// Which axis a single-row / single-column operand is stretched along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Broadcast {
    /// `1 x C` operand repeated for every row.
    Row,
    /// `R x 1` operand repeated for every column.
    Col,
}

impl Matrix {
    /// Builds a matrix from a flat row-major buffer.
    ///
    /// Fails with `Value` when either dimension is zero or when the buffer
    /// length is not `rows * cols`.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Matrix> {
        check_dims("Matrix::new", rows, cols)?;
        if data.len() != rows * cols {
            return Err(Error::value(
                "Matrix::new",
                format!("buffer holds {} values but shape ({rows}, {cols}) needs {}", data.len(), rows * cols),
            ));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Builds a matrix from nested rows. Every row must have the same length.
    pub fn from_data(data: Vec<Vec<f64>>) -> Result<Matrix> {
        let rows = data.len();
        let cols = data.first().map_or(0, Vec::len);
        check_dims("Matrix::from_data", rows, cols)?;

        if let Some((i, row)) = data.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(Error::value(
                "Matrix::from_data",
                format!("row {i} has {} values, expected {cols}", row.len()),
            ));
        }

        Ok(Matrix { rows, cols, data: data.into_iter().flatten().collect() })
    }

    pub fn zeros(rows: usize, cols: usize) -> Result<Matrix> {
        Matrix::filled(rows, cols, 0.0)
    }

    pub fn ones(rows: usize, cols: usize) -> Result<Matrix> {
        Matrix::filled(rows, cols, 1.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Result<Matrix> {
        check_dims("Matrix::filled", rows, cols)?;
        Ok(Matrix { rows, cols, data: vec![value; rows * cols] })
    }

    /// Zero matrix with the same shape as `self`.
    pub fn zeros_like(&self) -> Matrix {
        Matrix { rows: self.rows, cols: self.cols, data: vec![0.0; self.data.len()] }
    }

    /// Xavier (Glorot) initialization: samples from N(0, 2 / (rows + cols)).
    ///
    /// `rows` is the fan-in and `cols` the fan-out of the layer the matrix
    /// belongs to.
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Result<Matrix> {
        check_dims("Matrix::xavier", rows, cols)?;
        let std_dev = (2.0 / (rows + cols) as f64).sqrt();
        let data = (0..rows * cols)
            .map(|_| sample_standard_normal(rng) * std_dev)
            .collect();
        Ok(Matrix { rows, cols, data })
    }

    /// Crate-internal constructor for results whose shape is already known to
    /// be valid.
    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
        debug_assert!(rows > 0 && cols > 0);
        debug_assert_eq!(data.len(), rows * cols);
        Matrix { rows, cols, data }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Element count, always `rows * cols`.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// A matrix can never be empty; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Nested-row copy of the contents.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.cols).map(<[f64]>::to_vec).collect()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.data[row * self.cols + col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    /// Copy of one row as a `1 x cols` matrix.
    pub fn row(&self, row: usize) -> Result<Matrix> {
        if row >= self.rows {
            return Err(Error::Index { axis: "row", index: row, len: self.rows });
        }
        let start = row * self.cols;
        Ok(Matrix::from_parts(1, self.cols, self.data[start..start + self.cols].to_vec()))
    }

    /// Copy of one column as a `rows x 1` matrix.
    pub fn col(&self, col: usize) -> Result<Matrix> {
        if col >= self.cols {
            return Err(Error::Index { axis: "column", index: col, len: self.cols });
        }
        let data = self.data.iter().skip(col).step_by(self.cols).copied().collect();
        Ok(Matrix::from_parts(self.rows, 1, data))
    }

    /// Same buffer viewed under a new shape with the same element count.
    pub fn reshape(self, rows: usize, cols: usize) -> Result<Matrix> {
        check_dims("Matrix::reshape", rows, cols)?;
        if rows * cols != self.data.len() {
            return Err(Error::shape("Matrix::reshape", self.shape(), (rows, cols)));
        }
        Ok(Matrix { rows, cols, data: self.data })
    }

    /// Iterator over the rows as slices.
    pub fn row_slices(&self) -> std::slice::Chunks<'_, f64> {
        self.data.chunks(self.cols)
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows {
            return Err(Error::Index { axis: "row", index: row, len: self.rows });
        }
        if col >= self.cols {
            return Err(Error::Index { axis: "column", index: col, len: self.cols });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Element-wise arithmetic with broadcasting
    // -----------------------------------------------------------------------

    pub fn add(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_broadcast(rhs, "Matrix::add", |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_broadcast(rhs, "Matrix::sub", |a, b| a - b)
    }

    /// Hadamard product.
    pub fn mul(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_broadcast(rhs, "Matrix::mul", |a, b| a * b)
    }

    /// Element-wise division. Any zero in `rhs` is rejected.
    pub fn div(&self, rhs: &Matrix) -> Result<Matrix> {
        rhs.ensure_no_zero("Matrix::div")?;
        self.zip_broadcast(rhs, "Matrix::div", |a, b| a / b)
    }

    /// Adds `bias` (a `1 x cols` row vector) to every row.
    pub fn add_row(&self, bias: &Matrix) -> Result<Matrix> {
        if bias.rows != 1 || bias.cols != self.cols {
            return Err(Error::shape("Matrix::add_row", (1, self.cols), bias.shape()));
        }
        Ok(self.zip_with_kind(bias, None, Some(Broadcast::Row), self.shape(), |a, b| a + b))
    }

    pub fn div_scalar(&self, scalar: f64) -> Result<Matrix> {
        if scalar == 0.0 {
            return Err(Error::value("Matrix::div_scalar", "division by zero"));
        }
        Ok(self.map(|x| x / scalar))
    }

    /// `scalar / x` for every element.
    pub fn rdiv_scalar(&self, scalar: f64) -> Result<Matrix> {
        self.ensure_no_zero("Matrix::rdiv_scalar")?;
        Ok(self.map(|x| scalar / x))
    }

    /// `scalar - x` for every element.
    pub fn rsub_scalar(&self, scalar: f64) -> Matrix {
        self.map(|x| scalar - x)
    }

    fn ensure_no_zero(&self, context: &'static str) -> Result<()> {
        if let Some(idx) = self.data.iter().position(|&x| x == 0.0) {
            return Err(Error::value(
                context,
                format!("zero divisor at ({}, {})", idx / self.cols, idx % self.cols),
            ));
        }
        Ok(())
    }

    /// How `self` would stretch to cover `target`, if it can.
    fn broadcast_onto(&self, target: &Matrix) -> Option<Broadcast> {
        if self.rows == 1 && self.cols == target.cols {
            Some(Broadcast::Row)
        } else if self.cols == 1 && self.rows == target.rows {
            Some(Broadcast::Col)
        } else {
            None
        }
    }

    fn zip_broadcast<F>(&self, rhs: &Matrix, context: &'static str, f: F) -> Result<Matrix>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        if self.shape() == rhs.shape() {
            let data = self.data.par_iter()
                .zip(rhs.data.par_iter())
                .map(|(&a, &b)| f(a, b))
                .collect();
            return Ok(Matrix::from_parts(self.rows, self.cols, data));
        }

        if let Some(kind) = rhs.broadcast_onto(self) {
            return Ok(self.zip_with_kind(rhs, None, Some(kind), self.shape(), f));
        }
        if let Some(kind) = self.broadcast_onto(rhs) {
            return Ok(self.zip_with_kind(rhs, Some(kind), None, rhs.shape(), f));
        }

        Err(Error::shape(context, self.shape(), rhs.shape()))
    }

    fn zip_with_kind<F>(
        &self,
        rhs: &Matrix,
        lhs_kind: Option<Broadcast>,
        rhs_kind: Option<Broadcast>,
        (rows, cols): (usize, usize),
        f: F,
    ) -> Matrix
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        let data = (0..rows * cols)
            .into_par_iter()
            .map(|idx| {
                let (i, j) = (idx / cols, idx % cols);
                f(self.broadcast_at(lhs_kind, i, j), rhs.broadcast_at(rhs_kind, i, j))
            })
            .collect();
        Matrix::from_parts(rows, cols, data)
    }

    fn broadcast_at(&self, kind: Option<Broadcast>, i: usize, j: usize) -> f64 {
        match kind {
            None => self.data[i * self.cols + j],
            Some(Broadcast::Row) => self.data[j],
            Some(Broadcast::Col) => self.data[i],
        }
    }

    // -----------------------------------------------------------------------
    // Element-wise unary functions
    // -----------------------------------------------------------------------

    /// Applies `functor` to every element.
    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        let data = self.data.par_iter().map(|&x| functor(x)).collect();
        Matrix::from_parts(self.rows, self.cols, data)
    }

    pub fn exp(&self) -> Matrix {
        self.map(f64::exp)
    }

    /// Natural logarithm.
    pub fn ln(&self) -> Matrix {
        self.map(f64::ln)
    }

    pub fn tanh(&self) -> Matrix {
        self.map(f64::tanh)
    }

    pub fn powf(&self, power: f64) -> Matrix {
        self.map(|x| x.powf(power))
    }

    pub fn sqrt(&self) -> Matrix {
        self.map(f64::sqrt)
    }

    pub fn abs(&self) -> Matrix {
        self.map(f64::abs)
    }

    /// `-1`, `0` or `1` per element (zero maps to zero).
    pub fn sign(&self) -> Matrix {
        self.map(|x| if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 })
    }

    /// Clamp at zero: `max(0, x)`.
    pub fn relu(&self) -> Matrix {
        self.map(|x| if x > 0.0 { x } else { 0.0 })
    }

    // -----------------------------------------------------------------------
    // Reductions
    // -----------------------------------------------------------------------

    pub fn sum(&self) -> f64 {
        self.data.par_iter().sum()
    }

    pub fn mean(&self) -> f64 {
        self.sum() / self.data.len() as f64
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// True when no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

fn check_dims(context: &'static str, rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(Error::value(context, format!("shape ({rows}, {cols}) has a zero dimension")));
    }
    Ok(())
}

/// Samples a single value from N(0, 1) using the Box-Muller transform.
fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // Draw two independent uniform samples in (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix([")?;
        for (i, row) in self.row_slices().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{row:?}")?;
        }
        write!(f, "], shape=({}, {}))", self.rows, self.cols)
    }
}

// Scalar operators cannot fail, so they are plain operator overloads.

impl Add<f64> for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: f64) -> Matrix {
        self.map(|x| x + rhs)
    }
}

impl Sub<f64> for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: f64) -> Matrix {
        self.map(|x| x - rhs)
    }
}

impl Mul<f64> for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: f64) -> Matrix {
        self.map(|x| x * rhs)
    }
}

impl Neg for &Matrix {
    type Output = Matrix;

    fn neg(self) -> Matrix {
        self.map(|x| -x)
    }
}
