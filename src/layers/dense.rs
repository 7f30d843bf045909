use std::io::{Read, Write};

use rand::Rng;

use crate::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::codec::{read_matrix, write_matrix};
use crate::layers::{init_weights, Layer, LayerKind};
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

/// Fully-connected layer: `a = f(x W + b)`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub weights: Matrix,   // (input, output)
    pub biases: Matrix,    // (1, output)
    pub activator: ActivationFunction,
    weights_velocity: Matrix,
    biases_velocity: Matrix,
}

impl DenseLayer {
    pub fn new<R: Rng>(
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Result<DenseLayer> {
        if input_size == 0 || size == 0 {
            return Err(Error::config(format!(
                "dense layer needs non-zero sizes, got {} -> {}",
                input_size, size
            )));
        }

        Ok(DenseLayer {
            weights: init_weights(input_size, size, input_size, activation, rng),
            biases: Matrix::zeros(1, size),
            activator: activation,
            weights_velocity: Matrix::zeros(input_size, size),
            biases_velocity: Matrix::zeros(1, size),
        })
    }

    /// Builds a layer around existing parameters.
    pub fn from_parameters(weights: Matrix, biases: Matrix, activation: ActivationFunction) -> Result<DenseLayer> {
        if biases.rows != 1 || biases.cols != weights.cols {
            return Err(Error::config(format!(
                "bias shape {}x{} does not match weights {}x{}",
                biases.rows, biases.cols, weights.rows, weights.cols
            )));
        }
        let (rows, cols) = (weights.rows, weights.cols);
        Ok(DenseLayer {
            weights,
            biases,
            activator: activation,
            weights_velocity: Matrix::zeros(rows, cols),
            biases_velocity: Matrix::zeros(1, cols),
        })
    }
}

impl Layer for DenseLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Dense
    }

    fn input_shape(&self) -> Vec<usize> {
        vec![self.weights.rows]
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.weights.cols]
    }

    fn parameter_count(&self) -> usize {
        self.weights.data.len() + self.biases.data.len()
    }

    fn activation(&self) -> ActivationFunction {
        self.activator
    }

    fn describe(&self) -> String {
        format!("Dense: {} -> {} {}", self.weights.rows, self.weights.cols, self.activator)
    }

    fn forward(&self, batch: &Matrix) -> Matrix {
        let z = (batch * &self.weights).add_row(&self.biases);
        self.activator.activate(&z)
    }

    fn backward_and_update(
        &mut self,
        input: &Matrix,
        output: &Matrix,
        upstream: &Matrix,
        sgd: &Sgd,
    ) -> Matrix {
        // δ = dL/da ⊙ f'(z)
        let delta = self.activator.backprop(output, upstream);

        let weights_grad = &input.transpose() * &delta;
        let biases_grad = delta.sum_rows();
        let downstream = &delta * &self.weights.transpose();

        sgd.step(&mut self.weights, &mut self.weights_velocity, &weights_grad);
        sgd.step_bias(&mut self.biases, &mut self.biases_velocity, &biases_grad);

        downstream
    }

    fn reset_velocity(&mut self) {
        self.weights_velocity = Matrix::zeros(self.weights.rows, self.weights.cols);
        self.biases_velocity = Matrix::zeros(1, self.biases.cols);
    }

    fn write_parameters(&self, out: &mut dyn Write) -> Result<()> {
        write_matrix(out, &self.weights)?;
        write_matrix(out, &self.biases)
    }

    fn read_parameters(&mut self, input: &mut dyn Read) -> Result<()> {
        read_matrix(input, &mut self.weights)?;
        read_matrix(input, &mut self.biases)?;
        self.reset_velocity();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn identity_layer() -> DenseLayer {
        let weights = Matrix::from_data(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        DenseLayer::from_parameters(weights, Matrix::row_vector(&[0.5, -0.5]), ActivationFunction::Identity)
            .unwrap()
    }

    #[test]
    fn forward_applies_weights_and_bias() {
        let layer = identity_layer();
        let out = layer.forward(&Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0, 4.0]]));
        assert_eq!(out.data, vec![1.5, 1.5, 3.5, 3.5]);
    }

    #[test]
    fn backward_returns_gradient_with_pre_update_weights() {
        let mut layer = identity_layer();
        let input = Matrix::row_vector(&[1.0, 2.0]);
        let output = layer.forward(&input);
        let upstream = Matrix::row_vector(&[1.0, 0.0]);
        let downstream = layer.backward_and_update(&input, &output, &upstream, &Sgd::new(0.1));

        // W was identity, so dL/dx equals the upstream gradient.
        assert_eq!(downstream.data, vec![1.0, 0.0]);
        // dW = xᵀ δ → column 0 moves by -0.1 * [1, 2].
        assert_relative_eq!(layer.weights.get(0, 0), 0.9);
        assert_relative_eq!(layer.weights.get(1, 0), -0.2);
        assert_relative_eq!(layer.biases.get(0, 0), 0.4);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = DenseLayer::new(3, 2, ActivationFunction::Sigmoid, &mut rng).unwrap();
        let input = Matrix::row_vector(&[0.3, -0.7, 0.2]);

        // L = sum(output)
        let loss = |l: &DenseLayer| l.forward(&input).sum();
        let h = 1e-6;
        let mut bumped = layer.clone();
        bumped.weights.set(1, 0, layer.weights.get(1, 0) + h);
        let numeric = (loss(&bumped) - loss(&layer)) / h;

        let mut trained = layer.clone();
        let output = layer.forward(&input);
        trained.backward_and_update(&input, &output, &Matrix::row_vector(&[1.0, 1.0]), &Sgd::new(1.0));
        let analytic = layer.weights.get(1, 0) - trained.weights.get(1, 0);

        assert_relative_eq!(numeric, analytic, epsilon = 1e-4);
    }

    #[test]
    fn zero_sized_layers_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(DenseLayer::new(0, 4, ActivationFunction::Sigmoid, &mut rng).is_err());
    }
}
