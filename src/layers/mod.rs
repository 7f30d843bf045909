//! Layer abstraction and the concrete layer types.
//!
//! A network is a runtime list of `Box<dyn Layer>`. Every layer maps a batch
//! matrix `(batch, input_size)` to `(batch, output_size)`; convolutional
//! layers interpret each row as a flattened `[channels, height, width]`
//! volume.

pub mod codec;
pub mod conv;
pub mod dense;
pub mod rbm;

use std::fmt;
use std::io::{Read, Write};

use crate::activation::ActivationFunction;
use crate::error::Result;
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;
use crate::train::pretrain::PretrainConfig;

pub use conv::ConvLayer;
pub use dense::DenseLayer;
pub use rbm::RbmLayer;

/// Discriminant written to the weights file in front of every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Dense,
    Conv,
    Rbm,
}

impl LayerKind {
    pub fn tag(self) -> u8 {
        match self {
            LayerKind::Dense => 1,
            LayerKind::Conv => 2,
            LayerKind::Rbm => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<LayerKind> {
        match tag {
            1 => Some(LayerKind::Dense),
            2 => Some(LayerKind::Conv),
            3 => Some(LayerKind::Rbm),
            _ => None,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Dense => write!(f, "Dense"),
            LayerKind::Conv => write!(f, "Conv"),
            LayerKind::Rbm => write!(f, "RBM"),
        }
    }
}

/// Common interface of every layer held by a [`Dbn`](crate::network::Dbn).
pub trait Layer: fmt::Debug + Send {
    fn kind(&self) -> LayerKind;

    /// Per-sample input shape, e.g. `[784]` or `[1, 28, 28]`.
    fn input_shape(&self) -> Vec<usize>;

    /// Per-sample output shape.
    fn output_shape(&self) -> Vec<usize>;

    fn input_size(&self) -> usize {
        self.input_shape().iter().product()
    }

    fn output_size(&self) -> usize {
        self.output_shape().iter().product()
    }

    /// Number of trainable scalars, all of which are written by
    /// [`write_parameters`](Self::write_parameters).
    fn parameter_count(&self) -> usize;

    fn activation(&self) -> ActivationFunction;

    /// One-line summary for network display.
    fn describe(&self) -> String;

    /// Inference pass. Does not touch the parameters.
    fn forward(&self, batch: &Matrix) -> Matrix;

    fn is_pretrainable(&self) -> bool {
        false
    }

    /// One unsupervised update on `batch`. Returns the reconstruction error
    /// of the batch, or `None` for layers without a pretraining rule.
    fn pretrain_update(&mut self, _batch: &Matrix, _config: &PretrainConfig) -> Option<f64> {
        None
    }

    /// Backpropagates `upstream` (dL/d`output`) through this layer, applies
    /// the parameter update and returns dL/d`input`.
    ///
    /// `input` and `output` are the batch matrices of the forward pass that
    /// produced the loss. The returned gradient uses the weights from before
    /// the update.
    fn backward_and_update(
        &mut self,
        input: &Matrix,
        output: &Matrix,
        upstream: &Matrix,
        sgd: &Sgd,
    ) -> Matrix;

    /// Zeroes momentum buffers.
    fn reset_velocity(&mut self);

    fn write_parameters(&self, out: &mut dyn Write) -> Result<()>;

    /// Inverse of `write_parameters`. Velocities are reset.
    fn read_parameters(&mut self, input: &mut dyn Read) -> Result<()>;
}

/// Whether a layer expecting `consumer` can take the output `producer` of the
/// previous one: identical shapes, or a flat consumer of the same size.
pub fn shapes_compatible(producer: &[usize], consumer: &[usize]) -> bool {
    if producer == consumer {
        return true;
    }
    consumer.len() == 1 && producer.iter().product::<usize>() == consumer[0]
}

/// He initialization for ReLU-like activations, Xavier otherwise.
pub(crate) fn init_weights<R: rand::Rng>(
    rows: usize,
    cols: usize,
    fan_in: usize,
    activation: ActivationFunction,
    rng: &mut R,
) -> Matrix {
    match activation {
        ActivationFunction::ReLU
        | ActivationFunction::LeakyReLU { .. }
        | ActivationFunction::Elu { .. } => Matrix::he(rows, cols, fan_in, rng),
        _ => Matrix::xavier(rows, cols, fan_in, rng),
    }
}
