use crate::math::matrix::Matrix;

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE of one sample: mean((predicted - expected)²)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n
    }

    /// Sum of the per-sample losses over a batch (one sample per row).
    pub fn batch_loss(predicted: &Matrix, expected: &Matrix) -> f64 {
        (0..predicted.rows)
            .map(|r| MseLoss::loss(predicted.row(r), expected.row(r)))
            .sum()
    }

    /// Per-output gradient `predicted - expected`.
    ///
    /// This is the gradient of `½·sum((p - y)²)`, i.e. the gradient of `loss`
    /// scaled by `n/2`; the constant is left to the learning rate.
    pub fn derivative(predicted: &Matrix, expected: &Matrix) -> Matrix {
        predicted - expected
    }
}
