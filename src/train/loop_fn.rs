use crate::data::generator::DataGenerator;
use crate::error::Result;
use crate::network::dbn::Dbn;
use crate::train::trainer::SgdTrainer;

/// Fine-tunes `dbn` for at most `max_epochs` epochs and returns the error
/// reported by [`SgdTrainer::stop_training`].
///
/// An error from `train_epoch` ends the run: the trainer is still stopped
/// before the error is returned, so the network is left in a consistent
/// state.
pub fn fine_tune_loop(
    dbn: &mut Dbn,
    trainer: &mut SgdTrainer,
    generator: &mut DataGenerator<'_>,
    max_epochs: usize,
) -> Result<f64> {
    trainer.start_training(dbn, max_epochs);

    for epoch in 0..max_epochs {
        trainer.start_epoch(dbn, epoch);
        generator.reset();

        let (loss, error) = match trainer.train_epoch(dbn, generator, epoch) {
            Ok(result) => result,
            Err(e) => {
                trainer.stop_training(dbn);
                return Err(e);
            }
        };

        if trainer.stop_epoch(dbn, epoch, error, loss) {
            break;
        }
    }

    Ok(trainer.stop_training(dbn))
}
