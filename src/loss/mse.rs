use crate::math::matrix::Matrix;

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean(diff²) with `diff = predicted - expected`.
    pub fn loss(diff: &Matrix) -> f64 {
        diff.powf(2.0).mean()
    }

    /// Gradient w.r.t. the prediction: 2·diff / n
    pub fn derivative(diff: &Matrix) -> Matrix {
        diff * (2.0 / diff.len() as f64)
    }
}
