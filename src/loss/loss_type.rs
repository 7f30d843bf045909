use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::loss::{CrossEntropyLoss, MseLoss};
use crate::math::matrix::Matrix;

/// Selects which loss function the trainer uses.
///
/// - `Mse`          — Mean-squared error; pair with Sigmoid, Tanh or Identity output.
/// - `CrossEntropy` — Categorical cross-entropy; pair with Softmax output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    Mse,
    CrossEntropy,
}

impl LossType {
    /// The natural loss for a given output activation.
    pub fn for_output(activation: ActivationFunction) -> LossType {
        match activation {
            ActivationFunction::Softmax => LossType::CrossEntropy,
            _ => LossType::Mse,
        }
    }

    /// Whether [`derivative`](Self::derivative) is the right gradient to feed
    /// into a layer with this output activation. Cross-entropy yields the
    /// softmax logit gradient, so softmax and cross-entropy only go together.
    pub fn pairs_with(&self, activation: ActivationFunction) -> bool {
        (activation == ActivationFunction::Softmax) == (*self == LossType::CrossEntropy)
    }

    pub fn batch_loss(&self, predicted: &Matrix, expected: &Matrix) -> f64 {
        match self {
            LossType::Mse          => MseLoss::batch_loss(predicted, expected),
            LossType::CrossEntropy => CrossEntropyLoss::batch_loss(predicted, expected),
        }
    }

    /// Gradient fed into the output layer for every row of the batch:
    /// dL/d(output) up to a constant factor for `Mse`, dL/d(logits) for
    /// `CrossEntropy` behind a softmax.
    pub fn derivative(&self, predicted: &Matrix, expected: &Matrix) -> Matrix {
        match self {
            LossType::Mse          => MseLoss::derivative(predicted, expected),
            LossType::CrossEntropy => CrossEntropyLoss::derivative(predicted, expected),
        }
    }
}
