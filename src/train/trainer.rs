use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::data::generator::{Batch, DataGenerator, LabelMode};
use crate::error::{Error, Result};
use crate::loss::loss_type::LossType;
use crate::math::matrix::Matrix;
use crate::network::dbn::Dbn;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::{EpochStats, TrainingSummary};
use crate::train::train_config::TrainConfig;

/// Where a trainer is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    Started,
    EpochRunning(usize),
    EpochEvaluated(usize),
    Stopped,
}

/// Mini-batch SGD fine-tuning, driven one epoch at a time.
///
/// The canonical driving loop is:
///
/// ```text
/// trainer.start_training(&mut dbn, max_epochs);
/// for epoch in 0..max_epochs {
///     trainer.start_epoch(&dbn, epoch);
///     generator.reset();
///     let (loss, error) = trainer.train_epoch(&mut dbn, &mut generator, epoch)?;
///     if trainer.stop_epoch(&dbn, epoch, error, loss) {
///         break;
///     }
/// }
/// let error = trainer.stop_training(&mut dbn);
/// ```
///
/// [`fine_tune_loop`](crate::train::fine_tune_loop) runs exactly this.
#[derive(Debug)]
pub struct SgdTrainer {
    config: TrainConfig,
    state: TrainerState,
    max_epochs: usize,
    learning_rate: f64,
    epoch_start: Option<Instant>,
    best_error: Option<f64>,
    best_epoch: Option<usize>,
    stale_epochs: usize,
    last_error: Option<f64>,
    snapshot: Option<Vec<u8>>,
    stopped_at: Option<usize>,
    diverged: bool,
    history: Vec<EpochStats>,
}

impl SgdTrainer {
    pub fn new(config: TrainConfig) -> SgdTrainer {
        let learning_rate = config.learning_rate;
        SgdTrainer {
            config,
            state: TrainerState::Idle,
            max_epochs: 0,
            learning_rate,
            epoch_start: None,
            best_error: None,
            best_epoch: None,
            stale_epochs: 0,
            last_error: None,
            snapshot: None,
            stopped_at: None,
            diverged: false,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn history(&self) -> &[EpochStats] {
        &self.history
    }

    /// Learning rate of the current epoch.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn diverged(&self) -> bool {
        self.diverged
    }

    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            epochs_run: self.history.len(),
            final_error: self.last_error,
            best_error: self.best_error,
            best_epoch: self.best_epoch,
            diverged: self.diverged,
        }
    }

    /// Begins a run of at most `max_epochs` epochs. Clears everything a
    /// previous run recorded.
    pub fn start_training(&mut self, dbn: &mut Dbn, max_epochs: usize) {
        self.state = TrainerState::Started;
        self.max_epochs = max_epochs;
        self.learning_rate = self.config.learning_rate;
        self.epoch_start = None;
        self.best_error = None;
        self.best_epoch = None;
        self.stale_epochs = 0;
        self.last_error = None;
        self.snapshot = None;
        self.stopped_at = None;
        self.diverged = false;
        self.history.clear();

        dbn.reset_velocities();

        log::info!(
            "Fine-tuning: max {} epochs, lr {}, momentum {}, weight decay {}, batch size {}",
            max_epochs,
            self.config.learning_rate,
            self.config.momentum,
            self.config.weight_decay,
            self.config.batch_size
        );
    }

    /// Per-epoch setup: applies the learning-rate schedule.
    pub fn start_epoch(&mut self, _dbn: &Dbn, epoch: usize) {
        self.learning_rate = self.config.schedule.rate(self.config.learning_rate, epoch);
        self.epoch_start = Some(Instant::now());
        self.state = TrainerState::EpochRunning(epoch);
    }

    /// One pass over `generator`. Returns `(mean loss per sample, error rate)`.
    pub fn train_epoch(
        &mut self,
        dbn: &mut Dbn,
        generator: &mut DataGenerator<'_>,
        epoch: usize,
    ) -> Result<(f64, f64)> {
        match self.state {
            TrainerState::Idle | TrainerState::Stopped => {
                return Err(Error::config("train_epoch called outside of start_training/stop_training"));
            }
            TrainerState::Started | TrainerState::EpochEvaluated(_) => {
                // start_epoch was skipped; keep the schedule consistent.
                self.start_epoch(dbn, epoch);
            }
            TrainerState::EpochRunning(_) => {}
        }
        if !generator.is_labeled() {
            return Err(Error::data("fine-tuning needs labeled data"));
        }
        if generator.input_size() != dbn.input_size() {
            return Err(Error::data(format!(
                "samples have {} values but the network expects {}",
                generator.input_size(),
                dbn.input_size()
            )));
        }

        let output_activation = dbn.output_activation();
        let loss_type = self.config.loss_type.unwrap_or_else(|| LossType::for_output(output_activation));
        if !loss_type.pairs_with(output_activation) {
            return Err(Error::config(format!(
                "{:?} loss cannot train a {} output layer",
                loss_type, output_activation
            )));
        }
        let label_mode = generator.config().label_mode;
        let sgd = Sgd::new(self.learning_rate)
            .with_momentum(self.config.momentum)
            .with_weight_decay(self.config.weight_decay);

        generator.reset();

        let mut total_loss = 0.0;
        let mut wrong = 0usize;
        let mut seen = 0usize;

        while let Some(batch) = generator.next_batch() {
            let targets = targets_for(&batch, label_mode, dbn.output_size())?;
            let (batch_loss, outputs) = dbn.train_batch(&batch.inputs, &targets, loss_type, &sgd);

            total_loss += batch_loss;
            wrong += count_errors(&outputs, &batch.classes, label_mode);
            seen += batch.len();
        }

        if seen == 0 {
            return Err(Error::data("generator produced no batches"));
        }

        let loss = total_loss / seen as f64;
        let error = wrong as f64 / seen as f64;
        if !loss.is_finite() {
            log::warn!("epoch {}: loss is not finite ({}), training diverged", epoch, loss);
        }
        Ok((loss, error))
    }

    /// Records the epoch and decides whether the run is over. Once it has
    /// returned `true` it keeps returning `true`.
    pub fn stop_epoch(&mut self, dbn: &Dbn, epoch: usize, error: f64, loss: f64) -> bool {
        if self.stopped_at.is_some() {
            return true;
        }

        let elapsed_ms = self.epoch_start.take().map_or(0, |t| t.elapsed().as_millis() as u64);
        let diverged = !loss.is_finite();
        self.diverged |= diverged;

        let min_delta = self.config.early_stopping.map_or(0.0, |e| e.min_delta);
        let improved = self.best_error.map_or(true, |best| error < best - min_delta);
        if improved && !diverged {
            self.best_error = Some(error);
            self.best_epoch = Some(epoch);
            self.stale_epochs = 0;
            if self.config.restore_best {
                match dbn.snapshot() {
                    Ok(bytes) => self.snapshot = Some(bytes),
                    Err(e) => log::warn!("could not snapshot parameters: {}", e),
                }
            }
        } else {
            self.stale_epochs += 1;
        }
        self.last_error = Some(error);

        let stats = EpochStats {
            epoch,
            total_epochs: self.max_epochs,
            loss,
            error,
            learning_rate: self.learning_rate,
            elapsed_ms,
            diverged,
        };
        log::info!(
            "epoch {:>3}/{} - error: {:.5} loss: {:.5} lr: {:.5} time: {}ms",
            epoch + 1,
            self.max_epochs,
            error,
            loss,
            self.learning_rate,
            elapsed_ms
        );
        self.history.push(stats.clone());

        let mut receiver_gone = false;
        if let Some(ref tx) = self.config.progress_tx {
            // If the receiver has been dropped, stop training.
            receiver_gone = tx.send(stats).is_err();
        }

        let patience_exhausted = self
            .config
            .early_stopping
            .map_or(false, |e| self.stale_epochs >= e.patience.max(1));
        let goal_reached = self.config.error_goal.map_or(false, |goal| error <= goal);
        let flagged = self
            .config
            .stop_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed));

        let stop = epoch + 1 >= self.max_epochs
            || diverged
            || patience_exhausted
            || goal_reached
            || flagged
            || receiver_gone;

        if stop {
            self.stopped_at = Some(epoch);
            if patience_exhausted {
                log::info!("early stopping: no improvement for {} epochs", self.stale_epochs);
            }
        }
        self.state = TrainerState::EpochEvaluated(epoch);
        stop
    }

    /// Ends the run. With `restore_best`, reloads the best epoch's parameters
    /// and returns its error; otherwise returns the error of the last epoch.
    /// A run without any epoch reports an error of 1.
    pub fn stop_training(&mut self, dbn: &mut Dbn) -> f64 {
        self.state = TrainerState::Stopped;

        let error = if self.config.restore_best {
            if let Some(bytes) = self.snapshot.take() {
                if let Err(e) = dbn.read_weights(&mut bytes.as_slice()) {
                    log::warn!("could not restore best parameters: {}", e);
                }
            }
            self.best_error.or(self.last_error)
        } else {
            self.last_error
        };
        let error = error.unwrap_or(1.0);

        if self.diverged {
            log::warn!("fine-tuning diverged; the reported error does not reflect convergence");
        }
        log::info!("Fine-tuning finished after {} epochs, error {:.5}", self.history.len(), error);
        error
    }
}

fn targets_for(batch: &Batch, mode: LabelMode, outputs: usize) -> Result<Matrix> {
    match mode {
        LabelMode::Categorical => {
            let mut targets = Matrix::zeros(batch.len(), outputs);
            for (r, &c) in batch.classes.iter().enumerate() {
                if c >= outputs {
                    return Err(Error::data(format!(
                        "label {} does not fit a network with {} outputs",
                        c, outputs
                    )));
                }
                targets.set(r, c, 1.0);
            }
            Ok(targets)
        }
        LabelMode::Scalar => match &batch.targets {
            Some(t) if t.cols == outputs => Ok(t.clone()),
            _ => Err(Error::config(format!(
                "scalar labels need a network with a single output, found {}",
                outputs
            ))),
        },
    }
}

fn count_errors(outputs: &Matrix, classes: &[usize], mode: LabelMode) -> usize {
    classes
        .iter()
        .enumerate()
        .filter(|&(r, &c)| match mode {
            LabelMode::Categorical => outputs.argmax_row(r) != c,
            LabelMode::Scalar => outputs.get(r, 0).round() != c as f64,
        })
        .count()
}
