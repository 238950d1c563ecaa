use crate::error::Result;
use crate::math::matrix::Matrix;

/// Categorical cross-entropy loss for use with a Softmax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added to the prediction to prevent log(0) and division by zero.
pub const EPS: f64 = 1e-9;

/// `max(p, 0) + EPS`, strictly positive for every prediction.
fn guarded(predicted: &Matrix) -> Matrix {
    predicted.map(|p| p.max(0.0) + EPS)
}

impl CrossEntropyLoss {
    /// Computes the batch-mean cross-entropy:
    ///   L = -sum(expected * log(max(predicted, 0) + eps)) / batch_size
    ///
    /// `predicted`: probabilities, shape (batch, n_classes)
    /// `expected` : one-hot (or soft) targets, same shape
    pub fn loss(predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        let log_p = guarded(predicted).ln();
        let total = expected.mul(&log_p)?.sum();
        Ok(-total / predicted.rows() as f64)
    }

    /// Gradient w.r.t. the probabilities (not the logits):
    ///   -(expected / (predicted + eps)) / batch_size
    ///
    /// Chained through the Softmax backward this yields the usual
    /// `predicted - expected` logit gradient.
    pub fn derivative(predicted: &Matrix, expected: &Matrix) -> Result<Matrix> {
        let ratio = expected.div(&guarded(predicted))?;
        Ok(&ratio * (-1.0 / predicted.rows() as f64))
    }
}
