use crate::math::matrix::Matrix;

/// Categorical cross-entropy loss for use with a Softmax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// Computes the scalar cross-entropy loss of one sample:
    ///   L = -sum(expected[i] * log(predicted[i] + eps))
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        predicted.iter().zip(expected.iter())
            .map(|(p, e)| -e * (p + EPS).ln())
            .sum()
    }

    /// Sum of the per-sample losses over a batch (one sample per row).
    pub fn batch_loss(predicted: &Matrix, expected: &Matrix) -> f64 {
        (0..predicted.rows)
            .map(|r| CrossEntropyLoss::loss(predicted.row(r), expected.row(r)))
            .sum()
    }

    /// Gradient of the combined Softmax + cross-entropy w.r.t. the
    /// pre-softmax logits: `predicted - expected`.
    ///
    /// The Softmax layer's own derivative step is the identity so the
    /// Jacobian is not applied twice.
    pub fn derivative(predicted: &Matrix, expected: &Matrix) -> Matrix {
        predicted - expected
    }
}
