//! Valid 2D convolution over `[channels, height, width]` volumes.

use std::io::{Read, Write};

use rand::Rng;

use crate::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::codec::{read_matrix, write_matrix};
use crate::layers::{init_weights, Layer, LayerKind};
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

/// Geometry of a convolutional layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub filters: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride: usize,
}

impl ConvGeometry {
    pub fn output_height(&self) -> usize {
        (self.height - self.kernel_h) / self.stride + 1
    }

    pub fn output_width(&self) -> usize {
        (self.width - self.kernel_w) / self.stride + 1
    }

    fn patch_size(&self) -> usize {
        self.channels * self.kernel_h * self.kernel_w
    }

    fn positions(&self) -> usize {
        self.output_height() * self.output_width()
    }

    fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.filters == 0 || self.kernel_h == 0 || self.kernel_w == 0 {
            return Err(Error::config(format!("conv layer has a zero dimension: {:?}", self)));
        }
        if self.stride == 0 {
            return Err(Error::config("conv layer stride must be at least 1"));
        }
        if self.kernel_h > self.height || self.kernel_w > self.width {
            return Err(Error::config(format!(
                "conv kernel {}x{} does not fit a {}x{} input",
                self.kernel_h, self.kernel_w, self.height, self.width
            )));
        }
        Ok(())
    }
}

/// Convolutional layer with one bias per filter.
///
/// Filters are stored as a `(filters, channels * kernel_h * kernel_w)` matrix
/// and applied through an im2col expansion of each sample.
#[derive(Debug, Clone)]
pub struct ConvLayer {
    geometry: ConvGeometry,
    pub filters: Matrix,
    pub biases: Matrix,    // (1, filters)
    pub activator: ActivationFunction,
    filters_velocity: Matrix,
    biases_velocity: Matrix,
}

impl ConvLayer {
    pub fn new<R: Rng>(
        geometry: ConvGeometry,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Result<ConvLayer> {
        geometry.validate()?;
        let patch = geometry.patch_size();
        Ok(ConvLayer {
            geometry,
            filters: init_weights(geometry.filters, patch, patch, activation, rng),
            biases: Matrix::zeros(1, geometry.filters),
            activator: activation,
            filters_velocity: Matrix::zeros(geometry.filters, patch),
            biases_velocity: Matrix::zeros(1, geometry.filters),
        })
    }

    pub fn geometry(&self) -> ConvGeometry {
        self.geometry
    }

    /// `(positions, patch_size)` matrix of receptive fields for one sample.
    fn im2col(&self, sample: &[f64]) -> Matrix {
        let g = &self.geometry;
        let (oh, ow) = (g.output_height(), g.output_width());
        let mut cols = Matrix::zeros(oh * ow, g.patch_size());
        for oy in 0..oh {
            for ox in 0..ow {
                let row = cols.row_mut(oy * ow + ox);
                let mut k = 0;
                for c in 0..g.channels {
                    for ky in 0..g.kernel_h {
                        let y = oy * g.stride + ky;
                        let base = (c * g.height + y) * g.width + ox * g.stride;
                        row[k..k + g.kernel_w].copy_from_slice(&sample[base..base + g.kernel_w]);
                        k += g.kernel_w;
                    }
                }
            }
        }
        cols
    }

    /// Scatters patch gradients back onto the input volume (accumulating).
    fn col2im(&self, cols: &Matrix, grad: &mut [f64]) {
        let g = &self.geometry;
        let (oh, ow) = (g.output_height(), g.output_width());
        for oy in 0..oh {
            for ox in 0..ow {
                let row = cols.row(oy * ow + ox);
                let mut k = 0;
                for c in 0..g.channels {
                    for ky in 0..g.kernel_h {
                        let y = oy * g.stride + ky;
                        let base = (c * g.height + y) * g.width + ox * g.stride;
                        for kx in 0..g.kernel_w {
                            grad[base + kx] += row[k + kx];
                        }
                        k += g.kernel_w;
                    }
                }
            }
        }
    }

    /// Pre-activation for one sample, laid out `[filter][position]`.
    fn convolve(&self, sample: &[f64]) -> Matrix {
        let cols = self.im2col(sample);
        // (filters, patch) x (patch, positions)
        let mut z = &self.filters * &cols.transpose();
        for f in 0..z.rows {
            let b = self.biases.get(0, f);
            for v in z.row_mut(f) {
                *v += b;
            }
        }
        z
    }
}

impl Layer for ConvLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Conv
    }

    fn input_shape(&self) -> Vec<usize> {
        vec![self.geometry.channels, self.geometry.height, self.geometry.width]
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.geometry.filters, self.geometry.output_height(), self.geometry.output_width()]
    }

    fn parameter_count(&self) -> usize {
        self.filters.data.len() + self.biases.data.len()
    }

    fn activation(&self) -> ActivationFunction {
        self.activator
    }

    fn describe(&self) -> String {
        let g = &self.geometry;
        format!(
            "Conv: {}x{}x{} -> ({}x{}x{}, stride {}) -> {}x{}x{} {}",
            g.channels, g.height, g.width,
            g.filters, g.kernel_h, g.kernel_w, g.stride,
            g.filters, g.output_height(), g.output_width(),
            self.activator
        )
    }

    fn forward(&self, batch: &Matrix) -> Matrix {
        let out_size = self.output_size();
        let mut z = Matrix::zeros(batch.rows, out_size);
        for s in 0..batch.rows {
            let conv = self.convolve(batch.row(s));
            z.row_mut(s).copy_from_slice(&conv.data);
        }
        self.activator.activate(&z)
    }

    fn backward_and_update(
        &mut self,
        input: &Matrix,
        output: &Matrix,
        upstream: &Matrix,
        sgd: &Sgd,
    ) -> Matrix {
        let g = self.geometry;
        let positions = g.positions();
        let delta = self.activator.backprop(output, upstream);

        let mut filters_grad = Matrix::zeros(g.filters, g.patch_size());
        let mut biases_grad = Matrix::zeros(1, g.filters);
        let mut downstream = Matrix::zeros(input.rows, self.input_size());

        for s in 0..input.rows {
            // (filters, positions) view of this sample's delta
            let d = Matrix::from_vec(g.filters, positions, delta.row(s).to_vec());
            let cols = self.im2col(input.row(s));

            filters_grad = &filters_grad + &(&d * &cols);
            for f in 0..g.filters {
                biases_grad.data[f] += d.row(f).iter().sum::<f64>();
            }

            // (positions, filters) x (filters, patch)
            let dcols = &d.transpose() * &self.filters;
            self.col2im(&dcols, downstream.row_mut(s));
        }

        sgd.step(&mut self.filters, &mut self.filters_velocity, &filters_grad);
        sgd.step_bias(&mut self.biases, &mut self.biases_velocity, &biases_grad);

        downstream
    }

    fn reset_velocity(&mut self) {
        self.filters_velocity = Matrix::zeros(self.filters.rows, self.filters.cols);
        self.biases_velocity = Matrix::zeros(1, self.biases.cols);
    }

    fn write_parameters(&self, out: &mut dyn Write) -> Result<()> {
        write_matrix(out, &self.filters)?;
        write_matrix(out, &self.biases)
    }

    fn read_parameters(&mut self, input: &mut dyn Read) -> Result<()> {
        read_matrix(input, &mut self.filters)?;
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

    fn geometry(channels: usize, size: usize, filters: usize, kernel: usize, stride: usize) -> ConvGeometry {
        ConvGeometry {
            channels,
            height: size,
            width: size,
            filters,
            kernel_h: kernel,
            kernel_w: kernel,
            stride,
        }
    }

    #[test]
    fn output_shape_follows_valid_convolution() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = ConvLayer::new(geometry(1, 28, 6, 5, 1), ActivationFunction::Sigmoid, &mut rng).unwrap();
        assert_eq!(layer.output_shape(), vec![6, 24, 24]);
        assert_eq!(layer.parameter_count(), 6 * 25 + 6);

        let strided = ConvLayer::new(geometry(2, 9, 3, 3, 2), ActivationFunction::Tanh, &mut rng).unwrap();
        assert_eq!(strided.output_shape(), vec![3, 4, 4]);
    }

    #[test]
    fn invalid_geometry_is_a_configuration_error() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(ConvLayer::new(geometry(1, 4, 2, 5, 1), ActivationFunction::Sigmoid, &mut rng).is_err());
        assert!(ConvLayer::new(geometry(1, 8, 2, 3, 0), ActivationFunction::Sigmoid, &mut rng).is_err());
    }

    #[test]
    fn forward_matches_direct_convolution() {
        let mut rng = StdRng::seed_from_u64(2);
        let layer = ConvLayer::new(geometry(2, 4, 2, 2, 1), ActivationFunction::Identity, &mut rng).unwrap();
        let sample: Vec<f64> = (0..32).map(|i| (i as f64 * 0.37).sin()).collect();
        let out = layer.forward(&Matrix::row_vector(&sample));

        let g = layer.geometry();
        for f in 0..g.filters {
            for oy in 0..3 {
                for ox in 0..3 {
                    let mut expected = layer.biases.get(0, f);
                    for c in 0..2 {
                        for ky in 0..2 {
                            for kx in 0..2 {
                                let w = layer.filters.get(f, (c * 2 + ky) * 2 + kx);
                                expected += w * sample[(c * 4 + oy + ky) * 4 + ox + kx];
                            }
                        }
                    }
                    assert_relative_eq!(out.get(0, (f * 3 + oy) * 3 + ox), expected, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn input_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(4);
        let layer = ConvLayer::new(geometry(1, 5, 2, 3, 2), ActivationFunction::Tanh, &mut rng).unwrap();
        let sample: Vec<f64> = (0..25).map(|i| (i as f64 * 0.21).cos() * 0.5).collect();
        let input = Matrix::row_vector(&sample);
        let output = layer.forward(&input);
        let upstream = Matrix::from_vec(1, output.cols, vec![1.0; output.cols]);

        let mut scratch = layer.clone();
        let downstream = scratch.backward_and_update(&input, &output, &upstream, &Sgd::new(0.0));

        let h = 1e-6;
        for i in [0, 7, 12, 24] {
            let mut bumped = sample.clone();
            bumped[i] += h;
            let numeric = (layer.forward(&Matrix::row_vector(&bumped)).sum() - output.sum()) / h;
            assert_relative_eq!(numeric, downstream.get(0, i), epsilon = 1e-4);
        }
    }
}
