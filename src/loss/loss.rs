use crate::error::{ensure_shape, Error, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::loss_type::LossType;
use crate::loss::mae::MaeLoss;
use crate::loss::mse::MseLoss;
use crate::math::matrix::Matrix;

/// Cost function bound to the prediction/target pair of its last `forward`.
///
/// `forward` returns the scalar loss and caches both tables; `backward`
/// returns the gradient w.r.t. that prediction.
#[derive(Debug, Clone)]
pub struct Loss {
    kind: LossType,
    prediction: Option<Matrix>,
    target: Option<Matrix>,
    diff: Option<Matrix>,
}

impl Loss {
    pub fn new(kind: LossType) -> Loss {
        Loss { kind, prediction: None, target: None, diff: None }
    }

    pub fn mse() -> Loss {
        Loss::new(LossType::Mse)
    }

    pub fn mae() -> Loss {
        Loss::new(LossType::Mae)
    }

    pub fn cross_entropy() -> Loss {
        Loss::new(LossType::CrossEntropy)
    }

    pub fn kind(&self) -> LossType {
        self.kind
    }

    /// `prediction - target` from the last forward call.
    pub fn diff(&self) -> Option<&Matrix> {
        self.diff.as_ref()
    }

    pub fn forward(&mut self, prediction: &Matrix, target: &Matrix) -> Result<f64> {
        ensure_shape("Loss::forward", prediction.shape(), target.shape())?;
        let value = self.kind.value(prediction, target)?;

        self.diff = Some(prediction.sub(target)?);
        self.prediction = Some(prediction.clone());
        self.target = Some(target.clone());
        Ok(value)
    }

    /// Gradient w.r.t. the last prediction. The distance losses reuse the
    /// cached `diff`.
    pub fn backward(&self) -> Result<Matrix> {
        match (&self.prediction, &self.target, &self.diff) {
            (Some(prediction), Some(target), Some(diff)) => match self.kind {
                LossType::Mse => Ok(MseLoss::derivative(diff)),
                LossType::Mae => Ok(MaeLoss::derivative(diff)),
                LossType::CrossEntropy => CrossEntropyLoss::derivative(prediction, target),
            },
            _ => Err(Error::value("Loss::backward", "backward called before forward")),
        }
    }
}
