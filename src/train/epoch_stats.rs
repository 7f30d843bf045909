use serde::{Serialize, Deserialize};

/// Per-epoch fine-tuning statistics recorded by `SgdTrainer::stop_epoch`.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, one value is
/// sent at the end of every completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index.
    pub epoch: usize,
    /// Maximum number of epochs of this run.
    pub total_epochs: usize,
    /// Mean training loss per sample.
    pub loss: f64,
    /// Fraction of misclassified training samples, in [0, 1].
    pub error: f64,
    /// Learning rate used during the epoch.
    pub learning_rate: f64,
    /// Wall-clock duration of the epoch in milliseconds.
    pub elapsed_ms: u64,
    /// The loss was not finite.
    pub diverged: bool,
}

/// Outcome of a whole fine-tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub final_error: Option<f64>,
    pub best_error: Option<f64>,
    pub best_epoch: Option<usize>,
    pub diverged: bool,
}
