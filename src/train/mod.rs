pub mod epoch_stats;
pub mod loop_fn;
pub mod pretrain;
pub mod train_config;
pub mod trainer;

pub use epoch_stats::{EpochStats, TrainingSummary};
pub use loop_fn::fine_tune_loop;
pub use pretrain::{pretrain_layerwise, LayerPretrainReport, PretrainConfig, PretrainReport};
pub use train_config::{EarlyStopping, LrSchedule, TrainConfig};
pub use trainer::{SgdTrainer, TrainerState};
