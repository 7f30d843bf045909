use std::sync::mpsc;
use std::sync::{Arc, atomic::AtomicBool};

use serde::{Serialize, Deserialize};

use crate::loss::loss_type::LossType;
use crate::train::epoch_stats::EpochStats;

/// Learning-rate policy, evaluated once per epoch in `start_epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum LrSchedule {
    /// Always the base rate.
    #[default]
    Constant,
    /// `base * gamma ^ floor(epoch / every)`
    Step { every: usize, gamma: f64 },
    /// `base * gamma ^ epoch`
    Exponential { gamma: f64 },
}

impl LrSchedule {
    pub fn rate(&self, base: f64, epoch: usize) -> f64 {
        match *self {
            LrSchedule::Constant => base,
            LrSchedule::Step { every, gamma } => base * gamma.powi((epoch / every.max(1)) as i32),
            LrSchedule::Exponential { gamma } => base * gamma.powi(epoch as i32),
        }
    }
}

/// Stop when the training error has not improved by more than `min_delta`
/// for `patience` consecutive epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyStopping {
    pub patience: usize,
    #[serde(default)]
    pub min_delta: f64,
}

/// Configuration for a fine-tuning run.
///
/// # Fields
/// - `learning_rate` — base SGD step, shaped per epoch by `schedule`
/// - `momentum`      — classical momentum; `0.0` disables it
/// - `weight_decay`  — L2 penalty on weights (not biases)
/// - `batch_size`    — samples per mini-batch; use `1` for online SGD
/// - `loss_type`     — `None` picks cross-entropy for a softmax output and
///                     MSE otherwise; an explicit choice must match that
///                     pairing or `train_epoch` fails
/// - `early_stopping`, `error_goal` — optional stopping rules checked in
///                     `stop_epoch`
/// - `restore_best`  — reload the parameters of the best epoch at the end
/// - `shuffle`, `seed` — generator policy used by `Dbn::fine_tune`
/// - `progress_tx`   — optional channel sender; one `EpochStats` is sent per
///                     completed epoch.  If the receiver is dropped training
///                     stops at the end of the current epoch.
/// - `stop_flag`     — optional atomic flag; when set to `true` from another
///                     thread the run stops at the end of the current epoch.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub batch_size: usize,
    pub loss_type: Option<LossType>,
    pub schedule: LrSchedule,
    pub early_stopping: Option<EarlyStopping>,
    pub error_goal: Option<f64>,
    pub restore_best: bool,
    pub shuffle: bool,
    pub seed: u64,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            learning_rate: 0.1,
            momentum: 0.0,
            weight_decay: 0.0,
            batch_size: 10,
            loss_type: None,
            schedule: LrSchedule::Constant,
            early_stopping: None,
            error_goal: None,
            restore_best: false,
            shuffle: true,
            seed: 0,
            progress_tx: None,
            stop_flag: None,
        }
    }
}

impl TrainConfig {
    /// Creates a minimal `TrainConfig` with no progress channel and no stop flag.
    pub fn new(learning_rate: f64, batch_size: usize) -> Self {
        TrainConfig {
            learning_rate,
            batch_size,
            ..TrainConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn step_schedule_decays_every_n_epochs() {
        let s = LrSchedule::Step { every: 10, gamma: 0.5 };
        assert_relative_eq!(s.rate(5.0, 0), 5.0);
        assert_relative_eq!(s.rate(5.0, 9), 5.0);
        assert_relative_eq!(s.rate(5.0, 10), 2.5);
        assert_relative_eq!(s.rate(5.0, 20), 1.25);
    }

    #[test]
    fn exponential_schedule() {
        let s = LrSchedule::Exponential { gamma: 0.5 };
        assert_relative_eq!(s.rate(5.0, 3), 0.625);
        assert_relative_eq!(LrSchedule::Constant.rate(5.0, 1000), 5.0);
    }
}
