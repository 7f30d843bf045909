//! JSON task description: what network to build, where the data lives and
//! which actions to run on it.
//!
//! ```json
//! {
//!   "network": { "layers": [ { "type": "rbm", "visible": 784, "hidden": 100 },
//!                            { "type": "dense", "input": 100, "output": 10,
//!                              "activation": "softmax" } ] },
//!   "pretraining": { "samples": { "source": "train-images-idx3-ubyte", "reader": "mnist",
//!                                 "binarize": true, "limit": 1000 } },
//!   "training": { "samples": { "source": "train-images-idx3-ubyte", "reader": "mnist" },
//!                 "labels":  { "source": "train-labels-idx1-ubyte", "reader": "mnist" } },
//!   "train": { "epochs": 10, "learning_rate": 0.05 },
//!   "actions": ["pretrain", "train", "save"]
//! }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::data::reader::DatasourcePack;
use crate::error::{Error, Result};
use crate::network::spec::NetworkSpec;
use crate::train::pretrain::PretrainConfig;
use crate::train::train_config::{EarlyStopping, LrSchedule, TrainConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PretrainingDesc {
    pub epochs: usize,
    pub learning_rate: Option<f64>,
    pub momentum: Option<f64>,
    pub weight_decay: Option<f64>,
    pub batch_size: Option<usize>,
    pub cd_steps: Option<usize>,
}

impl Default for PretrainingDesc {
    fn default() -> Self {
        PretrainingDesc {
            epochs: 25,
            learning_rate: None,
            momentum: None,
            weight_decay: None,
            batch_size: None,
            cd_steps: None,
        }
    }
}

impl PretrainingDesc {
    /// Unset fields keep the `PretrainConfig` defaults.
    pub fn config(&self, seed: u64) -> PretrainConfig {
        let defaults = PretrainConfig::default();
        PretrainConfig {
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            momentum: self.momentum.unwrap_or(defaults.momentum),
            weight_decay: self.weight_decay.unwrap_or(defaults.weight_decay),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            cd_steps: self.cd_steps,
            seed,
            ..defaults
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingDesc {
    pub epochs: usize,
    pub learning_rate: Option<f64>,
    pub momentum: Option<f64>,
    pub weight_decay: Option<f64>,
    pub batch_size: Option<usize>,
    pub schedule: LrSchedule,
    pub early_stopping: Option<EarlyStopping>,
    pub error_goal: Option<f64>,
    pub restore_best: bool,
}

impl Default for TrainingDesc {
    fn default() -> Self {
        TrainingDesc {
            epochs: 25,
            learning_rate: None,
            momentum: None,
            weight_decay: None,
            batch_size: None,
            schedule: LrSchedule::Constant,
            early_stopping: None,
            error_goal: None,
            restore_best: false,
        }
    }
}

impl TrainingDesc {
    /// Unset fields keep the `TrainConfig` defaults.
    pub fn config(&self, seed: u64) -> TrainConfig {
        let defaults = TrainConfig::default();
        TrainConfig {
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            momentum: self.momentum.unwrap_or(defaults.momentum),
            weight_decay: self.weight_decay.unwrap_or(defaults.weight_decay),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            schedule: self.schedule,
            early_stopping: self.early_stopping,
            error_goal: self.error_goal,
            restore_best: self.restore_best,
            seed,
            ..defaults
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsDesc {
    pub file: String,
}

impl Default for WeightsDesc {
    fn default() -> Self {
        WeightsDesc { file: "weights.dat".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub network: Option<NetworkSpec>,
    pub pretraining: DatasourcePack,
    pub training: DatasourcePack,
    pub testing: DatasourcePack,
    pub pretrain: PretrainingDesc,
    pub train: TrainingDesc,
    pub weights: WeightsDesc,
    /// Actions run when none are given on the command line.
    pub actions: Vec<String>,
}

impl Task {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Task> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(text: &str) -> Result<Task> {
        Ok(serde_json::from_str(text)?)
    }

    /// Seed of the network spec, 0 without one.
    pub fn seed(&self) -> u64 {
        self.network.as_ref().map_or(0, |n| n.seed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pretrain,
    Train,
    Test,
    Save,
    Load,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Action> {
        match s {
            "pretrain" => Ok(Action::Pretrain),
            "train" => Ok(Action::Train),
            "test" => Ok(Action::Test),
            "save" => Ok(Action::Save),
            "load" => Ok(Action::Load),
            other => Err(Error::config(format!("Invalid action: {}", other))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Pretrain => "pretrain",
            Action::Train => "train",
            Action::Test => "test",
            Action::Save => "save",
            Action::Load => "load",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let task = Task::from_json(r#"{ "actions": ["test"] }"#).unwrap();
        assert!(task.network.is_none());
        assert_eq!(task.pretrain.epochs, 25);
        assert_eq!(task.train.epochs, 25);
        assert_eq!(task.train.learning_rate, None);
        assert_eq!(task.weights.file, "weights.dat");
        assert!(task.training.samples.empty());
    }

    #[test]
    fn unset_hyperparameters_fall_back_to_config_defaults() {
        let task = Task::from_json(r#"{ "train": { "epochs": 3, "momentum": 0.9 } }"#).unwrap();
        let config = task.train.config(7);
        assert_eq!(config.momentum, 0.9);
        assert_eq!(config.learning_rate, TrainConfig::default().learning_rate);
        assert_eq!(config.batch_size, TrainConfig::default().batch_size);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn actions_parse_by_name() {
        assert_eq!("save".parse::<Action>().unwrap(), Action::Save);
        assert_eq!(Action::Pretrain.to_string(), "pretrain");
        assert!(matches!("fly".parse::<Action>(), Err(Error::Configuration(_))));
    }
}
