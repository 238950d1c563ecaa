use serde::{Serialize, Deserialize};

use crate::error::{ensure_shape, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::mae::MaeLoss;
use crate::loss::mse::MseLoss;
use crate::math::matrix::Matrix;

/// Selects which cost function a model is compiled with.
///
/// - `Mse`         : Mean-squared error; pair with Linear or Sigmoid output.
/// - `Mae`         : Mean absolute error; pair with Linear output.
/// - `CrossEntropy`: Categorical cross-entropy; pair with Softmax output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    Mse,
    Mae,
    CrossEntropy,
}

impl LossType {
    pub fn name(&self) -> &'static str {
        match self {
            LossType::Mse => "mean_squared_error",
            LossType::Mae => "mean_absolute_error",
            LossType::CrossEntropy => "categorical_cross_entropy",
        }
    }

    /// Scalar loss of `predicted` against `expected` (shapes must match).
    pub fn value(&self, predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        ensure_shape("LossType::value", predicted.shape(), expected.shape())?;
        match self {
            LossType::Mse => Ok(MseLoss::loss(&predicted.sub(expected)?)),
            LossType::Mae => Ok(MaeLoss::loss(&predicted.sub(expected)?)),
            LossType::CrossEntropy => CrossEntropyLoss::loss(predicted, expected),
        }
    }

    /// Gradient of the loss w.r.t. `predicted`, full shape.
    pub fn gradient(&self, predicted: &Matrix, expected: &Matrix) -> Result<Matrix> {
        ensure_shape("LossType::gradient", predicted.shape(), expected.shape())?;
        match self {
            LossType::Mse => Ok(MseLoss::derivative(&predicted.sub(expected)?)),
            LossType::Mae => Ok(MaeLoss::derivative(&predicted.sub(expected)?)),
            LossType::CrossEntropy => CrossEntropyLoss::derivative(predicted, expected),
        }
    }
}
