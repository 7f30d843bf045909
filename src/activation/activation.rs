use serde::{Serialize, Deserialize};
use std::f64::consts::E;
use std::fmt;

use crate::math::matrix::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    Sigmoid,
    Tanh,
    #[serde(rename = "relu")]
    ReLU,
    #[serde(rename = "leaky_relu")]
    LeakyReLU { alpha: f64 },
    Elu { alpha: f64 },
    Identity,
    /// Vector-valued: normalizes each row of a batch. See [`activate`](Self::activate).
    Softmax,
}

impl ActivationFunction {
    /// Element-wise activation. `Softmax` has no element-wise form and
    /// returns `x` unchanged here; use [`activate`](Self::activate) on a batch.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Elu { alpha } => {
                if x > 0.0 { x } else { alpha * (E.powf(x) - 1.0) }
            }
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
        }
    }

    /// Derivative expressed in terms of the activated output `y = f(x)`.
    ///
    /// Layers only keep their outputs, so every supported function must have
    /// a derivative recoverable from `y`. For `Softmax` the layer is paired
    /// with cross-entropy, whose gradient `p - y` already includes the
    /// Jacobian, so the derivative is the identity.
    pub fn derivative_from_output(&self, y: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => y * (1.0 - y),
            ActivationFunction::Tanh => 1.0 - y * y,
            ActivationFunction::ReLU => if y > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if y > 0.0 { 1.0 } else { *alpha },
            ActivationFunction::Elu { alpha } => if y > 0.0 { 1.0 } else { y + alpha },
            ActivationFunction::Identity | ActivationFunction::Softmax => 1.0,
        }
    }

    /// Applies the activation to a whole batch of pre-activations.
    pub fn activate(&self, z: &Matrix) -> Matrix {
        match self {
            ActivationFunction::Softmax => {
                let mut out = z.clone();
                for r in 0..out.rows {
                    softmax_in_place(out.row_mut(r));
                }
                out
            }
            _ => z.map(|x| self.function(x)),
        }
    }

    /// Multiplies an upstream gradient by the derivative at `output`.
    pub fn backprop(&self, output: &Matrix, upstream: &Matrix) -> Matrix {
        match self {
            ActivationFunction::Identity | ActivationFunction::Softmax => upstream.clone(),
            _ => upstream.hadamard(&output.map(|y| self.derivative_from_output(y))),
        }
    }
}

/// Numerically stable softmax (max-shifted).
fn softmax_in_place(row: &mut [f64]) {
    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in row.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in row.iter_mut() {
        *v /= sum;
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationFunction::Sigmoid => write!(f, "SIGMOID"),
            ActivationFunction::Tanh => write!(f, "TANH"),
            ActivationFunction::ReLU => write!(f, "RELU"),
            ActivationFunction::LeakyReLU { alpha } => write!(f, "LEAKY_RELU({})", alpha),
            ActivationFunction::Elu { alpha } => write!(f, "ELU({})", alpha),
            ActivationFunction::Identity => write!(f, "IDENTITY"),
            ActivationFunction::Softmax => write!(f, "SOFTMAX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derivative_from_output_matches_finite_difference() {
        let h = 1e-6;
        let functions = [
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
            ActivationFunction::ReLU,
            ActivationFunction::LeakyReLU { alpha: 0.1 },
            ActivationFunction::Elu { alpha: 1.0 },
        ];
        for act in functions {
            for &x in &[-1.3, -0.4, 0.6, 2.1] {
                let numeric = (act.function(x + h) - act.function(x - h)) / (2.0 * h);
                let analytic = act.derivative_from_output(act.function(x));
                assert_relative_eq!(numeric, analytic, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let z = Matrix::from_data(vec![vec![1.0, 2.0, 3.0], vec![1000.0, 1000.0, 1000.0]]);
        let p = ActivationFunction::Softmax.activate(&z);
        for r in 0..p.rows {
            assert_relative_eq!(p.row(r).iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
        assert!(p.get(0, 2) > p.get(0, 1));
        assert_relative_eq!(p.get(1, 0), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn serde_names_are_snake_case() {
        let json = serde_json::to_string(&ActivationFunction::ReLU).unwrap();
        assert_eq!(json, "\"relu\"");
        let parsed: ActivationFunction = serde_json::from_str("{\"leaky_relu\":{\"alpha\":0.2}}").unwrap();
        assert_eq!(parsed, ActivationFunction::LeakyReLU { alpha: 0.2 });
    }
}
