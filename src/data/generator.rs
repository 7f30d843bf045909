//! Mini-batch generation over a [`Dataset`].

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::Dataset;
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// What happens to the last batch when the dataset size is not a multiple of
/// the batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialBatch {
    /// Yield the smaller final batch.
    #[default]
    Keep,
    /// Skip the final batch; its samples are not seen this epoch.
    Drop,
    /// Refuse to build the generator.
    Reject,
}

/// How labels are turned into target rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelMode {
    /// One-hot rows of width `classes`.
    #[default]
    Categorical,
    /// A single column holding the label value.
    Scalar,
}

/// Optional per-batch input transformation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Augmentation {
    /// Adds N(0, std_dev) noise to every input value.
    Noise { std_dev: f64 },
    /// Maps values above `threshold` to 1 and the rest to 0.
    Binarize { threshold: f64 },
}

/// Configuration for a [`DataGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Number of samples per batch.
    pub batch_size: usize,
    /// Whether to reshuffle the sample order on `reset()`.
    pub shuffle: bool,
    /// Seed of the generator's RNG (shuffling and augmentation).
    pub seed: u64,
    pub partial_batch: PartialBatch,
    pub label_mode: LabelMode,
    /// Width of one-hot targets; inferred from the labels when `None`.
    pub classes: Option<usize>,
    pub augmentation: Option<Augmentation>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            shuffle: true,
            seed: 0,
            partial_batch: PartialBatch::Keep,
            label_mode: LabelMode::Categorical,
            classes: None,
            augmentation: None,
        }
    }
}

impl GeneratorConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = s;
        self
    }

    pub fn partial_batch(mut self, p: PartialBatch) -> Self {
        self.partial_batch = p;
        self
    }

    pub fn label_mode(mut self, m: LabelMode) -> Self {
        self.label_mode = m;
        self
    }

    pub fn classes(mut self, c: usize) -> Self {
        self.classes = Some(c);
        self
    }

    pub fn augmentation(mut self, a: Augmentation) -> Self {
        self.augmentation = Some(a);
        self
    }
}

/// One batch: inputs, encoded targets and the raw class of each row.
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: Matrix,
    /// `None` for unlabeled datasets.
    pub targets: Option<Matrix>,
    /// Empty for unlabeled datasets.
    pub classes: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.inputs.rows
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.rows == 0
    }
}

/// Produces the batches of one epoch at a time over a [`Dataset`].
///
/// The sequence is lazy, finite and restartable: `next_batch()` returns
/// `None` once the epoch is exhausted and `reset()` starts the next one.
///
/// Shuffling is deterministic: the generator owns an `StdRng` seeded once
/// from `config.seed`, and every `reset()` that follows consumed batches
/// draws the next permutation from it. Two generators built with the same
/// seed therefore produce the same epochs in the same order. `reset()` must
/// be called before every epoch; calling it again before any batch was
/// taken does not reshuffle.
pub struct DataGenerator<'a> {
    dataset: &'a Dataset,
    config: GeneratorConfig,
    classes: usize,
    indices: Vec<usize>,
    cursor: usize,
    rng: StdRng,
    needs_shuffle: bool,
}

impl<'a> DataGenerator<'a> {
    pub fn new(dataset: &'a Dataset, config: GeneratorConfig) -> Result<Self> {
        let n = dataset.len();
        let bs = config.batch_size;
        if n == 0 {
            return Err(Error::data("cannot generate batches from an empty dataset"));
        }
        if bs == 0 {
            return Err(Error::config("batch size must be at least 1"));
        }
        match config.partial_batch {
            PartialBatch::Reject if n % bs != 0 => {
                return Err(Error::config(format!(
                    "dataset of {} samples is not a multiple of batch size {}",
                    n, bs
                )));
            }
            PartialBatch::Drop if bs > n => {
                return Err(Error::config(format!(
                    "batch size {} exceeds the {} samples and partial batches are dropped",
                    bs, n
                )));
            }
            _ => {}
        }

        let classes = config.classes.unwrap_or_else(|| dataset.num_classes());
        if let Some(labels) = dataset.labels() {
            if config.label_mode == LabelMode::Categorical {
                if let Some((i, &l)) = labels.iter().enumerate().find(|&(_, &l)| l >= classes) {
                    return Err(Error::data(format!(
                        "label {} at index {} is out of range for {} classes",
                        l, i, classes
                    )));
                }
            }
        }

        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            dataset,
            config,
            classes,
            indices: (0..n).collect(),
            cursor: 0,
            rng,
            needs_shuffle: true,
        })
    }

    /// Rewinds to the first batch, reshuffling if enabled.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.config.shuffle && self.needs_shuffle {
            self.indices.shuffle(&mut self.rng);
            self.needs_shuffle = false;
        }
    }

    /// The number of batches per epoch.
    pub fn batches_per_epoch(&self) -> usize {
        match self.config.partial_batch {
            PartialBatch::Drop => self.dataset.len() / self.config.batch_size,
            _ => self.dataset.len().div_ceil(self.config.batch_size),
        }
    }

    /// Number of samples yielded per epoch.
    pub fn samples_per_epoch(&self) -> usize {
        match self.config.partial_batch {
            PartialBatch::Drop => self.batches_per_epoch() * self.config.batch_size,
            _ => self.dataset.len(),
        }
    }

    /// Total number of samples in the dataset.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn is_labeled(&self) -> bool {
        self.dataset.is_labeled()
    }

    pub fn input_size(&self) -> usize {
        self.dataset.sample_size()
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn next_batch(&mut self) -> Option<Batch> {
        let n = self.dataset.len();
        let bs = self.config.batch_size;
        let start = self.cursor;
        if start >= n {
            return None;
        }
        if self.config.partial_batch == PartialBatch::Drop && start + bs > n {
            return None;
        }

        let end = (start + bs).min(n);
        self.cursor = end;
        self.needs_shuffle = true;

        let batch_indices = self.indices[start..end].to_vec();
        let mut inputs = Matrix::from_rows(self.dataset.samples(), &batch_indices);
        if let Some(augmentation) = self.config.augmentation {
            self.augment(&mut inputs, augmentation);
        }

        let (targets, classes) = match self.dataset.labels() {
            Some(labels) => {
                let classes: Vec<usize> = batch_indices.iter().map(|&i| labels[i]).collect();
                (Some(self.encode(&classes)), classes)
            }
            None => (None, Vec::new()),
        };

        Some(Batch { inputs, targets, classes })
    }

    fn encode(&self, classes: &[usize]) -> Matrix {
        match self.config.label_mode {
            LabelMode::Categorical => {
                let mut targets = Matrix::zeros(classes.len(), self.classes);
                for (r, &c) in classes.iter().enumerate() {
                    targets.set(r, c, 1.0);
                }
                targets
            }
            LabelMode::Scalar => {
                Matrix::from_vec(classes.len(), 1, classes.iter().map(|&c| c as f64).collect())
            }
        }
    }

    fn augment(&mut self, inputs: &mut Matrix, augmentation: Augmentation) {
        match augmentation {
            Augmentation::Noise { std_dev } => {
                for v in inputs.data.iter_mut() {
                    *v += Matrix::sample_standard_normal(&mut self.rng) * std_dev;
                }
            }
            Augmentation::Binarize { threshold } => {
                for v in inputs.data.iter_mut() {
                    *v = if *v > threshold { 1.0 } else { 0.0 };
                }
            }
        }
    }
}

impl Iterator for DataGenerator<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        self.next_batch()
    }
}
