pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod train;
pub mod eval;
pub mod task;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::{ConvLayer, DenseLayer, Layer, LayerKind, RbmLayer};
pub use network::{Dbn, LayerSpec, NetworkSpec};
pub use loss::loss_type::LossType;
pub use optim::sgd::Sgd;
pub use data::{Dataset, DataGenerator, GeneratorConfig};
pub use train::{fine_tune_loop, EpochStats, PretrainConfig, SgdTrainer, TrainConfig};
pub use eval::{evaluate, ConfusionMatrix, Evaluation};
pub use task::{execute, Action, Task};
pub use error::{Error, Result};
