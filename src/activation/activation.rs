use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::math::matrix::Matrix;

/// Stateless activation functions.
///
/// Each variant maps a whole table to a table of the same shape and knows how
/// to turn an upstream gradient into an input gradient, given the input and
/// output cached by the enclosing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    Tanh,
    ReLU,
    /// Identity; the gradient passes through unchanged.
    Linear,
    /// Row-wise softmax. Unlike the others it couples the elements of a row,
    /// so its gradient is a per-row Jacobian-vector product.
    Softmax,
}

impl ActivationFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::ReLU => "relu",
            ActivationFunction::Linear => "linear",
            ActivationFunction::Softmax => "softmax",
        }
    }

    pub fn forward(&self, input: &Matrix) -> Matrix {
        match self {
            ActivationFunction::Sigmoid => input.map(|x| 1.0 / (1.0 + (-x).exp())),
            ActivationFunction::Tanh => input.tanh(),
            ActivationFunction::ReLU => input.relu(),
            ActivationFunction::Linear => input.clone(),
            ActivationFunction::Softmax => softmax_rows(input),
        }
    }

    /// Gradient w.r.t. the input, given the cached `input`/`output` of the
    /// forward call and the gradient arriving from downstream.
    pub fn input_grad(&self, input: &Matrix, output: &Matrix, output_grad: &Matrix) -> Result<Matrix> {
        match self {
            ActivationFunction::Sigmoid => {
                let local = output.mul(&output.rsub_scalar(1.0))?;
                local.mul(output_grad)
            }
            ActivationFunction::Tanh => {
                let local = output.powf(2.0).rsub_scalar(1.0);
                output_grad.mul(&local)
            }
            ActivationFunction::ReLU => {
                let mask = input.map(|x| if x > 0.0 { 1.0 } else { 0.0 });
                output_grad.mul(&mask)
            }
            ActivationFunction::Linear => Ok(output_grad.clone()),
            ActivationFunction::Softmax => softmax_input_grad(output, output_grad),
        }
    }
}

/// Row-wise softmax, stabilised by subtracting each row's maximum.
fn softmax_rows(input: &Matrix) -> Matrix {
    let cols = input.cols();
    let mut out = input.as_slice().to_vec();

    out.par_chunks_mut(cols).for_each(|row| {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for x in row.iter_mut() {
            *x = (*x - max).exp();
            sum += *x;
        }
        for x in row.iter_mut() {
            *x /= sum;
        }
    });

    Matrix::from_parts(input.rows(), cols, out)
}

/// Per row: `s * (g - sum(s * g))`, the softmax Jacobian applied to `g`
/// without materialising the Jacobian.
fn softmax_input_grad(output: &Matrix, output_grad: &Matrix) -> Result<Matrix> {
    crate::error::ensure_shape("softmax backward", output.shape(), output_grad.shape())?;
    let cols = output.cols();
    let mut grad = vec![0.0; output.len()];

    grad.par_chunks_mut(cols)
        .zip(output.as_slice().par_chunks(cols))
        .zip(output_grad.as_slice().par_chunks(cols))
        .for_each(|((g_row, s_row), up_row)| {
            let dot: f64 = s_row.iter().zip(up_row).map(|(s, g)| s * g).sum();
            for ((g, &s), &up) in g_row.iter_mut().zip(s_row).zip(up_row) {
                *g = s * (up - dot);
            }
        });

    Ok(Matrix::from_parts(output.rows(), cols, grad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn m(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_data(rows).unwrap()
    }

    /// Central-difference gradient of `sum(f(x) * upstream)` w.r.t. `x`.
    fn numeric_grad(act: ActivationFunction, x: &Matrix, upstream: &Matrix) -> Vec<f64> {
        let h = 1e-6;
        (0..x.len())
            .map(|i| {
                let mut plus = x.clone();
                plus.as_mut_slice()[i] += h;
                let mut minus = x.clone();
                minus.as_mut_slice()[i] -= h;
                let fp = act.forward(&plus).mul(upstream).unwrap().sum();
                let fm = act.forward(&minus).mul(upstream).unwrap().sum();
                (fp - fm) / (2.0 * h)
            })
            .collect()
    }

    #[test]
    fn forward_values() {
        let x = m(vec![vec![-1.0, 0.0, 2.0]]);
        assert_abs_diff_eq!(ActivationFunction::Sigmoid.forward(&x).as_slice()[1], 0.5);
        assert_abs_diff_eq!(ActivationFunction::Tanh.forward(&x).as_slice()[2], 2.0_f64.tanh());
        assert_eq!(ActivationFunction::ReLU.forward(&x).as_slice(), &[0.0, 0.0, 2.0]);
        assert_eq!(ActivationFunction::Linear.forward(&x), x);
    }

    #[test]
    fn softmax_rows_sum_to_one_and_survive_large_inputs() {
        let x = m(vec![vec![1000.0, 1001.0, 1002.0], vec![-5.0, 0.0, 5.0]]);
        let s = ActivationFunction::Softmax.forward(&x);
        assert!(s.is_finite());
        for row in s.row_slices() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
        // Shift invariance: the first row equals softmax([0, 1, 2]).
        let shifted = ActivationFunction::Softmax.forward(&m(vec![vec![0.0, 1.0, 2.0]]));
        for (a, b) in s.row(0).unwrap().as_slice().iter().zip(shifted.as_slice()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn analytic_gradients_match_finite_differences() {
        let x = m(vec![vec![-0.7, 0.3, 1.2], vec![0.5, -1.5, 0.9]]);
        let upstream = m(vec![vec![0.2, -0.4, 1.0], vec![0.7, 0.1, -0.3]]);
        for act in [
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
            ActivationFunction::ReLU,
            ActivationFunction::Linear,
            ActivationFunction::Softmax,
        ] {
            let y = act.forward(&x);
            let analytic = act.input_grad(&x, &y, &upstream).unwrap();
            let numeric = numeric_grad(act, &x, &upstream);
            for (a, n) in analytic.as_slice().iter().zip(&numeric) {
                assert_abs_diff_eq!(*a, *n, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn relu_masks_on_input_sign() {
        let x = m(vec![vec![-1.0, 0.0, 3.0]]);
        let y = ActivationFunction::ReLU.forward(&x);
        let up = m(vec![vec![5.0, 5.0, 5.0]]);
        let g = ActivationFunction::ReLU.input_grad(&x, &y, &up).unwrap();
        assert_eq!(g.as_slice(), &[0.0, 0.0, 5.0]);
    }
}
