use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;

/// Mini-batch SGD with classical momentum and L2 weight decay.
///
/// Each parameter matrix carries a velocity of the same shape:
///
/// ```text
/// v ← momentum · v − lr · (grad + weight_decay · w)
/// w ← w + v
/// ```
///
/// With `momentum == 0` this is plain gradient descent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f64,
    #[serde(default)]
    pub momentum: f64,
    #[serde(default)]
    pub weight_decay: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, momentum: 0.0, weight_decay: 0.0 }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Sgd {
        self.momentum = momentum;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Sgd {
        self.weight_decay = weight_decay;
        self
    }

    /// Updates a weight matrix; weight decay applies.
    pub fn step(&self, weights: &mut Matrix, velocity: &mut Matrix, grad: &Matrix) {
        self.update(weights, velocity, grad, self.weight_decay);
    }

    /// Updates a bias row; biases are not decayed.
    pub fn step_bias(&self, biases: &mut Matrix, velocity: &mut Matrix, grad: &Matrix) {
        self.update(biases, velocity, grad, 0.0);
    }

    fn update(&self, params: &mut Matrix, velocity: &mut Matrix, grad: &Matrix, decay: f64) {
        assert_eq!(params.data.len(), grad.data.len(), "gradient shape mismatch");
        assert_eq!(params.data.len(), velocity.data.len(), "velocity shape mismatch");
        for ((w, v), g) in params.data.iter_mut().zip(velocity.data.iter_mut()).zip(&grad.data) {
            *v = self.momentum * *v - self.learning_rate * (g + decay * *w);
            *w += *v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_step_descends_the_gradient() {
        let sgd = Sgd::new(0.5);
        let mut w = Matrix::row_vector(&[1.0, -1.0]);
        let mut v = Matrix::zeros(1, 2);
        sgd.step(&mut w, &mut v, &Matrix::row_vector(&[2.0, -2.0]));
        assert_eq!(w.data, vec![0.0, 0.0]);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let sgd = Sgd::new(0.1).with_momentum(0.9);
        let mut w = Matrix::row_vector(&[0.0]);
        let mut v = Matrix::zeros(1, 1);
        let g = Matrix::row_vector(&[1.0]);
        sgd.step(&mut w, &mut v, &g);
        sgd.step(&mut w, &mut v, &g);
        // v1 = -0.1, v2 = 0.9 * -0.1 - 0.1 = -0.19
        assert!((v.data[0] + 0.19).abs() < 1e-12);
        assert!((w.data[0] + 0.29).abs() < 1e-12);
    }

    #[test]
    fn biases_ignore_weight_decay() {
        let sgd = Sgd::new(1.0).with_weight_decay(0.5);
        let mut b = Matrix::row_vector(&[2.0]);
        let mut v = Matrix::zeros(1, 1);
        sgd.step_bias(&mut b, &mut v, &Matrix::row_vector(&[0.0]));
        assert_eq!(b.data, vec![2.0]);
    }
}
