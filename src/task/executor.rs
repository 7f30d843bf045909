use std::io::Write;

use crate::data::dataset::Dataset;
use crate::data::generator::{DataGenerator, GeneratorConfig};
use crate::data::reader::{read_labels, read_samples, DatasourcePack};
use crate::error::{Error, Result};
use crate::eval::evaluator::{evaluate, Evaluation};
use crate::network::dbn::Dbn;
use crate::task::task::{Action, Task};
use crate::train::epoch_stats::TrainingSummary;
use crate::train::loop_fn::fine_tune_loop;
use crate::train::pretrain::PretrainReport;

const ERROR_PREFIX: &str = "ferrite-dbn: error:";
const TITLE_WIDTH: usize = 25;

/// What an action produced.
#[derive(Debug)]
pub enum ActionOutcome {
    Pretrained(PretrainReport),
    Trained { error: f64, summary: TrainingSummary },
    Tested(Evaluation),
    Saved(String),
    Loaded(String),
    /// The action could not run; later actions still do.
    Skipped(Error),
}

#[derive(Debug)]
pub struct ActionReport {
    /// The action name as given.
    pub action: String,
    pub outcome: ActionOutcome,
}

impl ActionReport {
    pub fn skipped(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Skipped(_))
    }
}

/// Runs `actions` in order on `dbn`, writing a human-readable report to
/// `out`. An action that fails is reported and skipped; the only error
/// returned is a failure to write to `out`.
pub fn execute<W: Write>(
    dbn: &mut Dbn,
    task: &Task,
    actions: &[String],
    out: &mut W,
) -> Result<Vec<ActionReport>> {
    print_title(out, "Network")?;
    writeln!(out, "{}", dbn)?;

    let mut reports = Vec::with_capacity(actions.len());
    for name in actions {
        let outcome = match name.parse::<Action>() {
            Ok(action) => {
                print_title(out, title(action))?;
                log::info!("Running action {}", action);
                run_action(dbn, task, action, out)
            }
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                writeln!(out, "{} {}", ERROR_PREFIX, e)?;
                log::warn!("action {} skipped: {}", name, e);
                ActionOutcome::Skipped(e)
            }
        };
        reports.push(ActionReport { action: name.clone(), outcome });
    }

    Ok(reports)
}

fn run_action<W: Write>(dbn: &mut Dbn, task: &Task, action: Action, out: &mut W) -> Result<ActionOutcome> {
    match action {
        Action::Pretrain => pretrain(dbn, task, out),
        Action::Train => train(dbn, task, out),
        Action::Test => test(dbn, task, out),
        Action::Save => {
            dbn.store(&task.weights.file)?;
            writeln!(out, "Weights saved")?;
            Ok(ActionOutcome::Saved(task.weights.file.clone()))
        }
        Action::Load => {
            dbn.load(&task.weights.file)?;
            writeln!(out, "Weights loaded")?;
            Ok(ActionOutcome::Loaded(task.weights.file.clone()))
        }
    }
}

fn pretrain<W: Write>(dbn: &mut Dbn, task: &Task, out: &mut W) -> Result<ActionOutcome> {
    if task.pretraining.samples.empty() {
        return Err(Error::data("pretrain is not possible without a pretraining input"));
    }
    let samples = read_samples(&task.pretraining.samples)?;

    let config = task.pretrain.config(task.seed());
    let report = dbn.pretrain(&samples, task.pretrain.epochs, &config)?;
    for layer in &report.layers {
        for (epoch, error) in layer.epoch_errors.iter().enumerate() {
            writeln!(out, "Layer {} epoch {} - Reconstruction error: {:.5}", layer.layer, epoch, error)?;
        }
    }
    Ok(ActionOutcome::Pretrained(report))
}

fn train<W: Write>(dbn: &mut Dbn, task: &Task, out: &mut W) -> Result<ActionOutcome> {
    let (samples, labels) = read_labeled(&task.training, "train")?;
    let dataset = Dataset::labeled(samples, labels)?;

    let config = task.train.config(task.seed());
    let generator_config = GeneratorConfig::default()
        .batch_size(config.batch_size)
        .shuffle(config.shuffle)
        .seed(config.seed)
        .classes(dbn.output_size());
    let mut generator = DataGenerator::new(&dataset, generator_config)?;

    let mut trainer = dbn.trainer(config);
    let error = fine_tune_loop(dbn, &mut trainer, &mut generator, task.train.epochs)?;
    for stats in trainer.history() {
        writeln!(
            out,
            "epoch {:>3} - error: {:.5} loss: {:.5} lr: {:.5} time: {}ms",
            stats.epoch, stats.error, stats.loss, stats.learning_rate, stats.elapsed_ms
        )?;
    }
    writeln!(out, "Training error: {:.5}", error)?;

    Ok(ActionOutcome::Trained { error, summary: trainer.summary() })
}

fn test<W: Write>(dbn: &mut Dbn, task: &Task, out: &mut W) -> Result<ActionOutcome> {
    let (samples, labels) = read_labeled(&task.testing, "test")?;
    let evaluation = evaluate(dbn, &samples, &labels)?;
    writeln!(out, "{}", evaluation)?;
    Ok(ActionOutcome::Tested(evaluation))
}

fn read_labeled(pack: &DatasourcePack, action: &str) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    if pack.samples.empty() || pack.labels.empty() {
        return Err(Error::data(format!(
            "{} is not possible without samples and labels",
            action
        )));
    }
    Ok((read_samples(&pack.samples)?, read_labels(&pack.labels)?))
}

fn title(action: Action) -> &'static str {
    match action {
        Action::Pretrain => "Pretraining",
        Action::Train => "Training",
        Action::Test => "Testing",
        Action::Save => "Save Weights",
        Action::Load => "Load Weights",
    }
}

/// Boxed section banner.
pub fn print_title<W: Write>(out: &mut W, value: &str) -> Result<()> {
    let padding = TITLE_WIDTH.saturating_sub(value.len() + 3);
    writeln!(out)?;
    writeln!(out, "{}", "*".repeat(TITLE_WIDTH))?;
    writeln!(out, "* {}{}*", value, " ".repeat(padding))?;
    writeln!(out, "{}", "*".repeat(TITLE_WIDTH))?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_boxed_to_a_fixed_width() {
        let mut buf = Vec::new();
        print_title(&mut buf, "Testing").unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "*".repeat(25));
        assert_eq!(lines[2], "* Testing               *");
        assert_eq!(lines[2].len(), 25);
    }
}
