use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::conv::ConvGeometry;
use crate::layers::{ConvLayer, DenseLayer, Layer, RbmLayer};
use crate::network::dbn::Dbn;

fn default_stride() -> usize {
    1
}

fn default_cd_steps() -> usize {
    1
}

/// Describes one layer in a network specification.
///
/// ```json
/// { "type": "conv", "channels": 1, "height": 28, "width": 28,
///   "filters": 6, "kernel": 5, "activation": "sigmoid" }
/// { "type": "dense", "input": 3456, "output": 10, "activation": "softmax" }
/// { "type": "rbm", "visible": 784, "hidden": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        input: usize,
        output: usize,
        activation: ActivationFunction,
    },
    Conv {
        channels: usize,
        height: usize,
        width: usize,
        filters: usize,
        /// Kernel side; `kernel_h`/`kernel_w` override it per axis.
        #[serde(default)]
        kernel: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kernel_h: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kernel_w: Option<usize>,
        #[serde(default = "default_stride")]
        stride: usize,
        activation: ActivationFunction,
    },
    Rbm {
        visible: usize,
        hidden: usize,
        #[serde(default = "default_cd_steps")]
        cd_steps: usize,
    },
}

impl LayerSpec {
    pub fn build(&self, rng: &mut StdRng) -> Result<Box<dyn Layer>> {
        Ok(match *self {
            LayerSpec::Dense { input, output, activation } => {
                Box::new(DenseLayer::new(input, output, activation, rng)?)
            }
            LayerSpec::Conv {
                channels,
                height,
                width,
                filters,
                kernel,
                kernel_h,
                kernel_w,
                stride,
                activation,
            } => {
                let geometry = ConvGeometry {
                    channels,
                    height,
                    width,
                    filters,
                    kernel_h: kernel_h.unwrap_or(kernel),
                    kernel_w: kernel_w.unwrap_or(kernel),
                    stride,
                };
                Box::new(ConvLayer::new(geometry, activation, rng)?)
            }
            LayerSpec::Rbm { visible, hidden, cd_steps } => {
                Box::new(RbmLayer::new(visible, hidden, cd_steps, rng)?)
            }
        })
    }
}

/// A serializable description of a network architecture.
///
/// Building twice from the same spec (same `seed`) gives bit-identical
/// initial parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name shown in the network summary.
    #[serde(default)]
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    /// Seed for parameter initialization and RBM sampling.
    #[serde(default)]
    pub seed: u64,
}

impl NetworkSpec {
    pub fn new(name: impl Into<String>, layers: Vec<LayerSpec>, seed: u64) -> NetworkSpec {
        NetworkSpec { name: name.into(), layers, seed }
    }

    /// Instantiates every layer and checks that the shapes chain.
    pub fn build(&self) -> Result<Dbn> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let layers = self
            .layers
            .iter()
            .map(|spec| spec.build(&mut rng))
            .collect::<Result<Vec<_>>>()?;
        let mut dbn = Dbn::new(layers)?;
        dbn.set_name(self.name.clone());
        Ok(dbn)
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json(path: &str) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
