//! Restricted Boltzmann machine with binary visible and hidden units.
//!
//! Pretrained with contrastive divergence (CD-k); afterwards it behaves as a
//! sigmoid dense layer `h = σ(v W + c)` during fine-tuning and inference.

use std::io::{Read, Write};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::codec::{read_matrix, write_matrix};
use crate::layers::{Layer, LayerKind};
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;
use crate::train::pretrain::PretrainConfig;

#[derive(Debug, Clone)]
pub struct RbmLayer {
    pub weights: Matrix,        // (visible, hidden)
    pub hidden_biases: Matrix,  // (1, hidden)
    pub visible_biases: Matrix, // (1, visible)
    cd_steps: usize,
    weights_velocity: Matrix,
    hidden_velocity: Matrix,
    visible_velocity: Matrix,
    rng: StdRng,
}

impl RbmLayer {
    /// Weights start from N(0, 0.01) as usual for RBMs; biases at zero.
    /// The sampling RNG is seeded from `rng`, so a seeded network pretrains
    /// identically run to run.
    pub fn new<R: Rng>(visible: usize, hidden: usize, cd_steps: usize, rng: &mut R) -> Result<RbmLayer> {
        if visible == 0 || hidden == 0 {
            return Err(Error::config(format!(
                "rbm layer needs non-zero sizes, got {} -> {}",
                visible, hidden
            )));
        }
        if cd_steps == 0 {
            return Err(Error::config("rbm layer needs at least one Gibbs step"));
        }

        Ok(RbmLayer {
            weights: Matrix::gaussian(visible, hidden, 0.01, rng),
            hidden_biases: Matrix::zeros(1, hidden),
            visible_biases: Matrix::zeros(1, visible),
            cd_steps,
            weights_velocity: Matrix::zeros(visible, hidden),
            hidden_velocity: Matrix::zeros(1, hidden),
            visible_velocity: Matrix::zeros(1, visible),
            rng: StdRng::seed_from_u64(rng.gen()),
        })
    }

    pub fn visible(&self) -> usize {
        self.weights.rows
    }

    pub fn hidden(&self) -> usize {
        self.weights.cols
    }

    /// p(h = 1 | v)
    pub fn hidden_probabilities(&self, visible: &Matrix) -> Matrix {
        ActivationFunction::Sigmoid.activate(&(visible * &self.weights).add_row(&self.hidden_biases))
    }

    /// p(v = 1 | h)
    pub fn visible_probabilities(&self, hidden: &Matrix) -> Matrix {
        ActivationFunction::Sigmoid
            .activate(&(hidden * &self.weights.transpose()).add_row(&self.visible_biases))
    }

    /// Mean squared reconstruction error of a batch after one up-down pass.
    pub fn reconstruction_error(&self, batch: &Matrix) -> f64 {
        let reconstructed = self.visible_probabilities(&self.hidden_probabilities(batch));
        squared_error(batch, &reconstructed) / batch.rows as f64
    }

    fn sample(&mut self, probabilities: &Matrix) -> Matrix {
        let rng = &mut self.rng;
        Matrix {
            rows: probabilities.rows,
            cols: probabilities.cols,
            data: probabilities
                .data
                .iter()
                .map(|&p| if rng.gen::<f64>() < p { 1.0 } else { 0.0 })
                .collect(),
        }
    }
}

fn squared_error(a: &Matrix, b: &Matrix) -> f64 {
    a.data.iter().zip(&b.data).map(|(x, y)| (x - y).powi(2)).sum()
}

impl Layer for RbmLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Rbm
    }

    fn input_shape(&self) -> Vec<usize> {
        vec![self.visible()]
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.hidden()]
    }

    fn parameter_count(&self) -> usize {
        self.weights.data.len() + self.hidden_biases.data.len() + self.visible_biases.data.len()
    }

    fn activation(&self) -> ActivationFunction {
        ActivationFunction::Sigmoid
    }

    fn describe(&self) -> String {
        format!("RBM: {} -> {} (CD-{})", self.visible(), self.hidden(), self.cd_steps)
    }

    fn forward(&self, batch: &Matrix) -> Matrix {
        self.hidden_probabilities(batch)
    }

    fn is_pretrainable(&self) -> bool {
        true
    }

    fn pretrain_update(&mut self, batch: &Matrix, config: &PretrainConfig) -> Option<f64> {
        let n = batch.rows as f64;

        // Positive phase
        let h0 = self.hidden_probabilities(batch);
        let mut hidden_states = self.sample(&h0);

        // Negative phase: k steps of Gibbs sampling, probabilities on the
        // visible side.
        let mut vk = self.visible_probabilities(&hidden_states);
        let mut hk = self.hidden_probabilities(&vk);
        for _ in 1..config.cd_steps.unwrap_or(self.cd_steps) {
            hidden_states = self.sample(&hk);
            vk = self.visible_probabilities(&hidden_states);
            hk = self.hidden_probabilities(&vk);
        }

        // Gradients of the negative log-likelihood approximation.
        let positive = &batch.transpose() * &h0;
        let negative = &vk.transpose() * &hk;
        let weights_grad = (&negative - &positive).scale(1.0 / n);
        let hidden_grad = (&hk - &h0).sum_rows().scale(1.0 / n);
        let visible_grad = (&vk - batch).sum_rows().scale(1.0 / n);

        let sgd = config.sgd();
        sgd.step(&mut self.weights, &mut self.weights_velocity, &weights_grad);
        sgd.step_bias(&mut self.hidden_biases, &mut self.hidden_velocity, &hidden_grad);
        sgd.step_bias(&mut self.visible_biases, &mut self.visible_velocity, &visible_grad);

        Some(squared_error(batch, &vk) / n)
    }

    fn backward_and_update(
        &mut self,
        input: &Matrix,
        output: &Matrix,
        upstream: &Matrix,
        sgd: &Sgd,
    ) -> Matrix {
        let delta = ActivationFunction::Sigmoid.backprop(output, upstream);

        let weights_grad = &input.transpose() * &delta;
        let hidden_grad = delta.sum_rows();
        let downstream = &delta * &self.weights.transpose();

        sgd.step(&mut self.weights, &mut self.weights_velocity, &weights_grad);
        sgd.step_bias(&mut self.hidden_biases, &mut self.hidden_velocity, &hidden_grad);

        downstream
    }

    fn reset_velocity(&mut self) {
        self.weights_velocity = Matrix::zeros(self.weights.rows, self.weights.cols);
        self.hidden_velocity = Matrix::zeros(1, self.hidden());
        self.visible_velocity = Matrix::zeros(1, self.visible());
    }

    fn write_parameters(&self, out: &mut dyn Write) -> Result<()> {
        write_matrix(out, &self.weights)?;
        write_matrix(out, &self.hidden_biases)?;
        write_matrix(out, &self.visible_biases)
    }

    fn read_parameters(&mut self, input: &mut dyn Read) -> Result<()> {
        read_matrix(input, &mut self.weights)?;
        read_matrix(input, &mut self.hidden_biases)?;
        read_matrix(input, &mut self.visible_biases)?;
        self.reset_velocity();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Matrix {
        Matrix::from_data(vec![
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        ])
    }

    #[test]
    fn contrastive_divergence_lowers_reconstruction_error() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut rbm = RbmLayer::new(6, 4, 1, &mut rng).unwrap();
        let batch = patterns();
        let config = PretrainConfig { learning_rate: 0.5, momentum: 0.5, ..PretrainConfig::default() };

        let before = rbm.reconstruction_error(&batch);
        for _ in 0..300 {
            rbm.pretrain_update(&batch, &config);
        }
        let after = rbm.reconstruction_error(&batch);
        assert!(after < before * 0.5, "before {} after {}", before, after);
    }

    #[test]
    fn seeded_rbms_pretrain_identically() {
        let config = PretrainConfig::default();
        let run = || {
            let mut rng = StdRng::seed_from_u64(5);
            let mut rbm = RbmLayer::new(6, 3, 2, &mut rng).unwrap();
            for _ in 0..10 {
                rbm.pretrain_update(&patterns(), &config);
            }
            rbm.weights
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn parameters_include_visible_biases() {
        let mut rng = StdRng::seed_from_u64(0);
        let rbm = RbmLayer::new(5, 3, 1, &mut rng).unwrap();
        assert_eq!(rbm.parameter_count(), 5 * 3 + 3 + 5);
        let mut buf = Vec::new();
        rbm.write_parameters(&mut buf).unwrap();
        assert_eq!(buf.len(), rbm.parameter_count() * 8);
    }
}
