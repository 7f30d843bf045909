// Command-line driver: runs the actions of a JSON task on the network it
// describes.
//
//   ferrite-dbn task.json                 # actions listed in the task
//   ferrite-dbn task.json pretrain test   # actions from the command line
//
// Set RUST_LOG=info (or debug) for progress logs.

use std::io::{self, Write};
use std::process::ExitCode;

use ferrite_dbn::task::ActionReport;
use ferrite_dbn::{execute, Dbn, Error, Result, Task};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(task_path) = args.first() else {
        eprintln!("usage: ferrite-dbn <task.json> [action ...]");
        eprintln!("actions: pretrain, train, test, save, load");
        return ExitCode::from(2);
    };

    let task = match Task::load_json(task_path) {
        Ok(task) => task,
        Err(e) => {
            eprintln!("ferrite-dbn: error: cannot read {}: {}", task_path, e);
            return ExitCode::FAILURE;
        }
    };

    let built = task
        .network
        .as_ref()
        .ok_or_else(|| Error::config("the task does not describe a network"))
        .and_then(|spec| spec.build());
    let mut dbn = match built {
        Ok(dbn) => dbn,
        Err(e) => {
            eprintln!("ferrite-dbn: error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let actions = if args.len() > 1 { args[1..].to_vec() } else { task.actions.clone() };
    if actions.is_empty() {
        log::warn!("no actions given");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run(&mut dbn, &task, &actions, &mut out) {
        Ok(reports) => {
            let skipped = reports.iter().filter(|r| r.skipped()).count();
            if skipped > 0 {
                log::warn!("{} of {} actions skipped", skipped, reports.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ferrite-dbn: error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Executes the actions and flushes `out`, so a failed write of the last
/// report is an error rather than a silent success.
fn run<W: Write>(dbn: &mut Dbn, task: &Task, actions: &[String], out: &mut W) -> Result<Vec<ActionReport>> {
    let reports = execute(dbn, task, actions, &mut *out)?;
    out.flush()?;
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_dbn::{ActivationFunction, LayerSpec, NetworkSpec};

    /// Accepts writes, fails on flush.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn a_failed_flush_is_reported() {
        let spec = NetworkSpec::new(
            "cli",
            vec![LayerSpec::Dense { input: 2, output: 2, activation: ActivationFunction::Softmax }],
            0,
        );
        let mut dbn = spec.build().unwrap();
        let result = run(&mut dbn, &Task::default(), &[], &mut BrokenPipe);
        assert!(matches!(result, Err(Error::Io(_))));

        let mut buf = Vec::new();
        assert!(run(&mut dbn, &Task::default(), &[], &mut buf).unwrap().is_empty());
    }
}
