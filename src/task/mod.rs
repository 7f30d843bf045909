pub mod executor;
pub mod task;

pub use crate::data::reader::{Datasource, DatasourcePack};
pub use executor::{execute, print_title, ActionOutcome, ActionReport};
pub use task::{Action, PretrainingDesc, Task, TrainingDesc, WeightsDesc};
