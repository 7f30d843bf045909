use crate::error::{Error, Result};

/// Samples paired by index with optional class labels.
///
/// Every sample has the same length; labeled datasets have exactly one label
/// per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    samples: Vec<Vec<f64>>,
    labels: Option<Vec<usize>>,
}

impl Dataset {
    pub fn labeled(samples: Vec<Vec<f64>>, labels: Vec<usize>) -> Result<Dataset> {
        if samples.len() != labels.len() {
            return Err(Error::data(format!(
                "{} samples but {} labels",
                samples.len(),
                labels.len()
            )));
        }
        Dataset::check_samples(&samples)?;
        Ok(Dataset { samples, labels: Some(labels) })
    }

    /// Samples only, as used for pretraining.
    pub fn unlabeled(samples: Vec<Vec<f64>>) -> Result<Dataset> {
        Dataset::check_samples(&samples)?;
        Ok(Dataset { samples, labels: None })
    }

    fn check_samples(samples: &[Vec<f64>]) -> Result<()> {
        let Some(first) = samples.first() else {
            return Err(Error::data("dataset is empty"));
        };
        if first.is_empty() {
            return Err(Error::data("samples have no features"));
        }
        if let Some((i, s)) = samples.iter().enumerate().find(|(_, s)| s.len() != first.len()) {
            return Err(Error::data(format!(
                "sample {} has {} values, expected {}",
                i,
                s.len(),
                first.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Vec<f64>] {
        &self.samples
    }

    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    pub fn is_labeled(&self) -> bool {
        self.labels.is_some()
    }

    /// Length of a single sample.
    pub fn sample_size(&self) -> usize {
        self.samples[0].len()
    }

    /// `max(label) + 1`, or 0 for unlabeled data.
    pub fn num_classes(&self) -> usize {
        self.labels
            .as_ref()
            .and_then(|l| l.iter().max())
            .map_or(0, |&m| m + 1)
    }
}
