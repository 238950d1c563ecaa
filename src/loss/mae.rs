use crate::math::matrix::Matrix;

pub struct MaeLoss;

impl MaeLoss {
    /// Scalar MAE: mean(|diff|)
    pub fn loss(diff: &Matrix) -> f64 {
        diff.abs().mean()
    }

    /// Per-output subgradient: sign(diff) / n  (0 when equal)
    pub fn derivative(diff: &Matrix) -> Matrix {
        &diff.sign() * (1.0 / diff.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn loss_and_subgradient() {
        let diff = Matrix::from_data(vec![vec![-1.0, 0.0], vec![3.0, -4.0]]).unwrap();
        assert_relative_eq!(MaeLoss::loss(&diff), 2.0);
        assert_eq!(MaeLoss::derivative(&diff).as_slice(), &[-0.25, 0.0, 0.25, -0.25]);
    }
}
