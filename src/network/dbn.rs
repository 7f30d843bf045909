use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::activation::ActivationFunction;
use crate::data::dataset::Dataset;
use crate::data::generator::{DataGenerator, GeneratorConfig};
use crate::error::{Error, Result};
use crate::layers::codec::{read_u32, read_u64, write_u32, write_u64};
use crate::layers::{shapes_compatible, Layer, LayerKind};
use crate::loss::loss_type::LossType;
use crate::math::matrix::{argmax, Matrix};
use crate::optim::sgd::Sgd;
use crate::train::loop_fn::fine_tune_loop;
use crate::train::pretrain::{pretrain_layerwise, PretrainConfig, PretrainReport};
use crate::train::train_config::TrainConfig;
use crate::train::trainer::SgdTrainer;

const WEIGHTS_MAGIC: &[u8; 4] = b"FDBN";
const WEIGHTS_VERSION: u32 = 1;

/// A deep belief network: an ordered stack of layers whose shapes chain.
///
/// The container exclusively owns its layers. Everything that changes the
/// parameters takes `&mut self`, so a network is trained by one run at a time.
#[derive(Debug)]
pub struct Dbn {
    name: String,
    layers: Vec<Box<dyn Layer>>,
}

impl Dbn {
    /// Checks that every layer accepts the output of the one before it.
    pub fn new(layers: Vec<Box<dyn Layer>>) -> Result<Dbn> {
        if layers.is_empty() {
            return Err(Error::config("a network needs at least one layer"));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            let (producer, consumer) = (pair[0].output_shape(), pair[1].input_shape());
            if !shapes_compatible(&producer, &consumer) {
                return Err(Error::config(format!(
                    "layer {} outputs {:?} but layer {} expects {:?}",
                    i,
                    producer,
                    i + 1,
                    consumer
                )));
            }
        }
        Ok(Dbn { name: String::new(), layers })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Box<dyn Layer>] {
        &mut self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    pub fn output_activation(&self) -> ActivationFunction {
        self.layers[self.layers.len() - 1].activation()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }

    // ---------------------------------------------------------------------
    // Inference
    // ---------------------------------------------------------------------

    /// Forward pass of a `(batch, input_size)` matrix.
    pub fn forward_batch(&self, inputs: &Matrix) -> Matrix {
        self.layers
            .iter()
            .fold(inputs.clone(), |current, layer| layer.forward(&current))
    }

    /// Output activations for a single sample.
    ///
    /// # Panics
    /// Panics if `sample.len() != self.input_size()`.
    pub fn activation_probabilities(&self, sample: &[f64]) -> Vec<f64> {
        self.forward_batch(&Matrix::row_vector(sample)).data
    }

    /// Index of the largest output; ties go to the lowest index.
    ///
    /// # Panics
    /// Panics if `sample.len() != self.input_size()`.
    pub fn predict(&self, sample: &[f64]) -> usize {
        argmax(&self.activation_probabilities(sample))
    }

    /// Predicts every row of `inputs` in one forward pass.
    pub fn predict_batch(&self, inputs: &Matrix) -> Vec<usize> {
        let outputs = self.forward_batch(inputs);
        (0..outputs.rows).map(|r| outputs.argmax_row(r)).collect()
    }

    // ---------------------------------------------------------------------
    // Training
    // ---------------------------------------------------------------------

    /// One forward/backward/update step on a batch. Returns the summed loss
    /// of the batch and the outputs of the forward pass.
    pub(crate) fn train_batch(
        &mut self,
        inputs: &Matrix,
        targets: &Matrix,
        loss_type: LossType,
        sgd: &Sgd,
    ) -> (f64, Matrix) {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(inputs.clone());
        for layer in &self.layers {
            let next = layer.forward(&activations[activations.len() - 1]);
            activations.push(next);
        }

        let output = &activations[self.layers.len()];
        let loss = loss_type.batch_loss(output, targets);
        let mut delta = loss_type.derivative(output, targets).scale(1.0 / inputs.rows as f64);

        for i in (0..self.layers.len()).rev() {
            delta = self.layers[i].backward_and_update(&activations[i], &activations[i + 1], &delta, sgd);
        }

        let output = activations.pop().unwrap_or_default();
        (loss, output)
    }

    /// Greedy layer-wise pretraining of every pretrainable layer. Labels are
    /// never used; `epochs == 0` skips the phase.
    pub fn pretrain(
        &mut self,
        samples: &[Vec<f64>],
        epochs: usize,
        config: &PretrainConfig,
    ) -> Result<PretrainReport> {
        pretrain_layerwise(self, samples, epochs, config)
    }

    pub fn trainer(&self, config: TrainConfig) -> SgdTrainer {
        SgdTrainer::new(config)
    }

    /// Supervised fine-tuning with mini-batch SGD. Returns the final training
    /// error (the best one when `config.restore_best` is set).
    pub fn fine_tune(
        &mut self,
        samples: &[Vec<f64>],
        labels: &[usize],
        epochs: usize,
        config: &TrainConfig,
    ) -> Result<f64> {
        let dataset = Dataset::labeled(samples.to_vec(), labels.to_vec())?;
        let generator_config = GeneratorConfig::default()
            .batch_size(config.batch_size)
            .shuffle(config.shuffle)
            .seed(config.seed)
            .classes(self.output_size());
        let mut generator = DataGenerator::new(&dataset, generator_config)?;
        let mut trainer = self.trainer(config.clone());
        fine_tune_loop(self, &mut trainer, &mut generator, epochs)
    }

    pub fn reset_velocities(&mut self) {
        for layer in &mut self.layers {
            layer.reset_velocity();
        }
    }

    // ---------------------------------------------------------------------
    // Weights
    // ---------------------------------------------------------------------

    pub fn write_weights(&self, out: &mut dyn Write) -> Result<()> {
        out.write_all(WEIGHTS_MAGIC)?;
        write_u32(out, WEIGHTS_VERSION)?;
        write_u32(out, self.layers.len() as u32)?;
        for layer in &self.layers {
            out.write_all(&[layer.kind().tag()])?;
            write_u64(out, layer.parameter_count() as u64)?;
            layer.write_parameters(out)?;
        }
        Ok(())
    }

    /// Replaces every parameter with the ones in `input`. The whole stream is
    /// validated against this network before any layer is modified, so a
    /// failed load leaves the network untouched.
    pub fn read_weights(&mut self, input: &mut dyn Read) -> Result<()> {
        let mut magic = [0u8; 4];
        input
            .read_exact(&mut magic)
            .map_err(|_| Error::weights("missing weights header"))?;
        if &magic != WEIGHTS_MAGIC {
            return Err(Error::weights("not a weights file (bad magic)"));
        }
        let version = read_u32(input)?;
        if version != WEIGHTS_VERSION {
            return Err(Error::weights(format!(
                "unsupported weights format version {}",
                version
            )));
        }
        let count = read_u32(input)? as usize;
        if count != self.layers.len() {
            return Err(Error::weights(format!(
                "file holds {} layers, network has {}",
                count,
                self.layers.len()
            )));
        }

        let mut blocks = Vec::with_capacity(count);
        for (i, layer) in self.layers.iter().enumerate() {
            let mut tag = [0u8; 1];
            input
                .read_exact(&mut tag)
                .map_err(|_| Error::weights("unexpected end of weights data"))?;
            let kind = LayerKind::from_tag(tag[0])
                .ok_or_else(|| Error::weights(format!("layer {}: unknown kind tag {}", i, tag[0])))?;
            if kind != layer.kind() {
                return Err(Error::weights(format!(
                    "layer {}: file holds a {} layer, network has {}",
                    i,
                    kind,
                    layer.kind()
                )));
            }
            let params = read_u64(input)? as usize;
            if params != layer.parameter_count() {
                return Err(Error::weights(format!(
                    "layer {}: file holds {} parameters, network has {}",
                    i,
                    params,
                    layer.parameter_count()
                )));
            }
            let mut block = vec![0u8; params * 8];
            input
                .read_exact(&mut block)
                .map_err(|_| Error::weights("unexpected end of weights data"))?;
            blocks.push(block);
        }

        let mut rest = [0u8; 1];
        if input.read(&mut rest)? != 0 {
            return Err(Error::weights("trailing data after the last layer"));
        }

        for (layer, block) in self.layers.iter_mut().zip(blocks) {
            layer.read_parameters(&mut block.as_slice())?;
        }
        Ok(())
    }

    /// Writes the weights file to `path`.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_weights(&mut writer)?;
        writer.flush()?;
        log::info!("Weights stored in {}", path.display());
        Ok(())
    }

    /// Reads a weights file written by [`store`](Self::store).
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        self.read_weights(&mut reader)?;
        log::info!("Weights loaded from {}", path.display());
        Ok(())
    }

    /// In-memory copy of the weights, restorable with `read_weights`.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_weights(&mut bytes)?;
        Ok(bytes)
    }
}

impl fmt::Display for Dbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            writeln!(f, "{}", self.name)?;
        }
        writeln!(f, "Input: {} values", self.input_size())?;
        for (i, layer) in self.layers.iter().enumerate() {
            writeln!(
                f,
                "  [{}] {} ({}, {} parameters)",
                i,
                layer.describe(),
                layer.activation(),
                layer.parameter_count()
            )?;
        }
        write!(f, "Total parameters: {}", self.parameter_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{DenseLayer, RbmLayer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn network(seed: u64) -> Dbn {
        let mut rng = StdRng::seed_from_u64(seed);
        Dbn::new(vec![
            Box::new(RbmLayer::new(4, 3, 1, &mut rng).unwrap()),
            Box::new(DenseLayer::new(3, 2, ActivationFunction::Softmax, &mut rng).unwrap()),
        ])
        .unwrap()
    }

    #[test]
    fn empty_and_mismatched_stacks_are_rejected() {
        assert!(matches!(Dbn::new(vec![]), Err(Error::Configuration(_))));

        let mut rng = StdRng::seed_from_u64(0);
        let result = Dbn::new(vec![
            Box::new(RbmLayer::new(4, 3, 1, &mut rng).unwrap()),
            Box::new(DenseLayer::new(5, 2, ActivationFunction::Sigmoid, &mut rng).unwrap()),
        ]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn weights_round_trip_through_memory() {
        let source = network(1);
        let mut target = network(2);
        let sample = [1.0, 0.0, 1.0, 0.0];
        assert_ne!(source.activation_probabilities(&sample), target.activation_probabilities(&sample));

        target.read_weights(&mut source.snapshot().unwrap().as_slice()).unwrap();
        assert_eq!(source.activation_probabilities(&sample), target.activation_probabilities(&sample));
        assert_eq!(source.snapshot().unwrap(), target.snapshot().unwrap());
    }

    #[test]
    fn bad_weights_leave_the_network_untouched() {
        let mut dbn = network(3);
        let before = dbn.snapshot().unwrap();

        let mut truncated = network(4).snapshot().unwrap();
        truncated.truncate(truncated.len() - 8);
        assert!(matches!(dbn.read_weights(&mut truncated.as_slice()), Err(Error::Weights(_))));

        let mut bad_magic = network(4).snapshot().unwrap();
        bad_magic[0] = b'X';
        assert!(matches!(dbn.read_weights(&mut bad_magic.as_slice()), Err(Error::Weights(_))));

        assert_eq!(dbn.snapshot().unwrap(), before);
    }

    #[test]
    fn summary_lists_every_layer() {
        let mut dbn = network(0);
        dbn.set_name("tiny");
        let text = dbn.to_string();
        assert!(text.starts_with("tiny"));
        assert!(text.contains("[0] RBM: 4 -> 3"));
        assert!(text.contains(&format!("Total parameters: {}", dbn.parameter_count())));
    }
}
