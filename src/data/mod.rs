pub mod dataset;
pub mod generator;
pub mod reader;

pub use dataset::Dataset;
pub use generator::{Augmentation, Batch, DataGenerator, GeneratorConfig, LabelMode, PartialBatch};
pub use reader::{read_labels, read_samples, Datasource, DatasourcePack};
