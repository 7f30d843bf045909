use serde::{Serialize, Deserialize};

use crate::data::dataset::Dataset;
use crate::data::generator::{DataGenerator, GeneratorConfig};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;
use crate::network::dbn::Dbn;
use crate::optim::sgd::Sgd;

/// Hyperparameters of greedy layer-wise pretraining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PretrainConfig {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub batch_size: usize,
    /// Overrides the Gibbs steps each RBM was built with.
    pub cd_steps: Option<usize>,
    pub shuffle: bool,
    pub seed: u64,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        PretrainConfig {
            learning_rate: 0.1,
            momentum: 0.5,
            weight_decay: 0.0,
            batch_size: 10,
            cd_steps: None,
            shuffle: true,
            seed: 0,
        }
    }
}

impl PretrainConfig {
    pub fn sgd(&self) -> Sgd {
        Sgd::new(self.learning_rate)
            .with_momentum(self.momentum)
            .with_weight_decay(self.weight_decay)
    }
}

/// Reconstruction error per epoch of one pretrained layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPretrainReport {
    /// Position of the layer in the network.
    pub layer: usize,
    pub epoch_errors: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PretrainReport {
    pub layers: Vec<LayerPretrainReport>,
}

impl PretrainReport {
    /// Error of the last epoch of every pretrained layer, in layer order.
    pub fn final_errors(&self) -> Vec<f64> {
        self.layers
            .iter()
            .filter_map(|l| l.epoch_errors.last().copied())
            .collect()
    }
}

/// Greedy layer-wise pretraining.
///
/// Every pretrainable layer `k` is trained for `epochs` epochs on the
/// samples propagated through layers `0..k`, which by then have finished
/// their own pretraining. Layers without a pretraining rule are only used to
/// transform the inputs.
pub fn pretrain_layerwise(
    dbn: &mut Dbn,
    samples: &[Vec<f64>],
    epochs: usize,
    config: &PretrainConfig,
) -> Result<PretrainReport> {
    let mut report = PretrainReport::default();
    if epochs == 0 {
        log::info!("Pretraining skipped: 0 epochs");
        return Ok(report);
    }
    if config.cd_steps == Some(0) {
        return Err(Error::config("pretraining needs at least one Gibbs step"));
    }
    if samples.is_empty() {
        return Err(Error::data("no samples to pretrain on"));
    }
    if let Some((i, s)) = samples.iter().enumerate().find(|(_, s)| s.len() != dbn.input_size()) {
        return Err(Error::data(format!(
            "sample {} has {} values but the network expects {}",
            i,
            s.len(),
            dbn.input_size()
        )));
    }

    let Some(last) = dbn.layers().iter().rposition(|l| l.is_pretrainable()) else {
        log::info!("Pretraining skipped: no pretrainable layer");
        return Ok(report);
    };

    let mut inputs = samples.to_vec();
    for k in 0..=last {
        if dbn.layers()[k].is_pretrainable() {
            let layer_report = pretrain_layer(dbn, k, &inputs, epochs, config)?;
            report.layers.push(layer_report);
        }
        if k < last {
            let batch = Matrix::from_vec(inputs.len(), inputs[0].len(), inputs.concat());
            inputs = dbn.layers()[k].forward(&batch).to_rows();
        }
    }

    Ok(report)
}

fn pretrain_layer(
    dbn: &mut Dbn,
    k: usize,
    inputs: &[Vec<f64>],
    epochs: usize,
    config: &PretrainConfig,
) -> Result<LayerPretrainReport> {
    let dataset = Dataset::unlabeled(inputs.to_vec())?;
    let generator_config = GeneratorConfig::default()
        .batch_size(config.batch_size)
        .shuffle(config.shuffle)
        .seed(config.seed.wrapping_add(k as u64));
    let mut generator = DataGenerator::new(&dataset, generator_config)?;

    let layer = &mut dbn.layers_mut()[k];
    log::info!("Pretraining layer {}: {}", k, layer.describe());
    layer.reset_velocity();

    let mut epoch_errors = Vec::with_capacity(epochs);
    for epoch in 0..epochs {
        generator.reset();
        let mut total = 0.0;
        let mut seen = 0usize;
        while let Some(batch) = generator.next_batch() {
            if let Some(error) = layer.pretrain_update(&batch.inputs, config) {
                total += error * batch.len() as f64;
                seen += batch.len();
            }
        }
        let error = if seen == 0 { 0.0 } else { total / seen as f64 };
        if !error.is_finite() {
            log::warn!("layer {} epoch {}: reconstruction error is not finite", k, epoch);
        }
        log::debug!("layer {} epoch {:>3}/{} - reconstruction error: {:.5}", k, epoch + 1, epochs, error);
        epoch_errors.push(error);
    }

    if let Some(last) = epoch_errors.last() {
        log::info!("Layer {} pretrained, reconstruction error {:.5}", k, last);
    }
    Ok(LayerPretrainReport { layer: k, epoch_errors })
}
