use std::fmt;

use crate::error::{Error, Result};
use crate::eval::confusion::ConfusionMatrix;
use crate::math::matrix::Matrix;
use crate::network::dbn::Dbn;

/// Statistics of one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassStats {
    pub samples: usize,
    pub correct: usize,
}

impl ClassStats {
    /// `(samples - correct) / samples`, or `None` for a class without
    /// samples.
    pub fn error_rate(&self) -> Option<f64> {
        if self.samples == 0 {
            None
        } else {
            Some((self.samples - self.correct) as f64 / self.samples as f64)
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.error_rate().map(|e| 1.0 - e)
    }
}

/// Result of evaluating a network on a labeled dataset.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub total: usize,
    pub errors: usize,
}

impl Evaluation {
    /// Mismatched predictions over all samples.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.errors as f64 / self.total as f64
        }
    }

    pub fn accuracy(&self) -> f64 {
        1.0 - self.error_rate()
    }

    pub fn class_stats(&self, class: usize) -> ClassStats {
        ClassStats {
            samples: self.confusion.row_sum(class),
            correct: self.confusion.correct(class),
        }
    }

    /// Unweighted mean of the per-class error rates, over the classes that
    /// have samples.
    pub fn mean_class_error(&self) -> f64 {
        let rates: Vec<f64> = (0..self.confusion.classes())
            .filter_map(|c| self.class_stats(c).error_rate())
            .collect();
        if rates.is_empty() {
            0.0
        } else {
            rates.iter().sum::<f64>() / rates.len() as f64
        }
    }

    pub fn mean_class_accuracy(&self) -> f64 {
        1.0 - self.mean_class_error()
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples:    {}", self.total)?;
        writeln!(f, "Error rate: {:.4}", self.error_rate())?;
        writeln!(f, "Accuracy:   {:.4}", self.accuracy())?;
        writeln!(f)?;
        writeln!(f, "{:>6} {:>8} {:>8} {:>8} {:>8}", "class", "samples", "correct", "error", "accuracy")?;
        for c in 0..self.confusion.classes() {
            let stats = self.class_stats(c);
            match (stats.error_rate(), stats.accuracy()) {
                (Some(e), Some(a)) => writeln!(
                    f,
                    "{:>6} {:>8} {:>8} {:>8.4} {:>8.4}",
                    c, stats.samples, stats.correct, e, a
                )?,
                _ => writeln!(f, "{:>6} {:>8} {:>8} {:>8} {:>8}", c, 0, 0, "-", "-")?,
            }
        }
        writeln!(f, "Mean class error:    {:.4}", self.mean_class_error())?;
        writeln!(f, "Mean class accuracy: {:.4}", self.mean_class_accuracy())?;
        writeln!(f)?;
        write!(f, "{}", self.confusion)
    }
}

/// Samples forwarded together while evaluating. Bounds the size of the
/// intermediate activations independently of the test set.
const EVAL_CHUNK: usize = 64;

/// Predicted class of every sample, `chunk` samples per forward pass.
fn predictions<'a>(dbn: &'a Dbn, samples: &'a [Vec<f64>], chunk: usize) -> impl Iterator<Item = usize> + 'a {
    samples.chunks(chunk).flat_map(move |rows| {
        let indices: Vec<usize> = (0..rows.len()).collect();
        dbn.predict_batch(&Matrix::from_rows(rows, &indices))
    })
}

/// Runs `dbn` over every sample and tallies the predictions against
/// `labels`. The number of classes is the network's output size.
pub fn evaluate(dbn: &Dbn, samples: &[Vec<f64>], labels: &[usize]) -> Result<Evaluation> {
    if samples.is_empty() {
        return Err(Error::data("no samples to evaluate"));
    }
    if samples.len() != labels.len() {
        return Err(Error::data(format!(
            "{} samples but {} labels",
            samples.len(),
            labels.len()
        )));
    }
    let classes = dbn.output_size();
    if let Some((i, &l)) = labels.iter().enumerate().find(|&(_, &l)| l >= classes) {
        return Err(Error::data(format!(
            "label {} at index {} is out of range for {} classes",
            l, i, classes
        )));
    }
    if let Some((i, s)) = samples.iter().enumerate().find(|(_, s)| s.len() != dbn.input_size()) {
        return Err(Error::data(format!(
            "sample {} has {} values but the network expects {}",
            i,
            s.len(),
            dbn.input_size()
        )));
    }

    let mut confusion = ConfusionMatrix::new(classes);
    let mut errors = 0;
    for (&actual, predicted) in labels.iter().zip(predictions(dbn, samples, EVAL_CHUNK)) {
        confusion.add(actual, predicted);
        if actual != predicted {
            errors += 1;
        }
    }

    let evaluation = Evaluation { confusion, total: samples.len(), errors };
    log::info!(
        "Evaluated {} samples: error rate {:.4}",
        evaluation.total,
        evaluation.error_rate()
    );
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn evaluation(pairs: &[(usize, usize)], classes: usize) -> Evaluation {
        let mut confusion = ConfusionMatrix::new(classes);
        let mut errors = 0;
        for &(a, p) in pairs {
            confusion.add(a, p);
            errors += (a != p) as usize;
        }
        Evaluation { confusion, total: pairs.len(), errors }
    }

    #[test]
    fn per_class_rates_count_misses() {
        let e = evaluation(&[(0, 0), (0, 1), (1, 1), (1, 1)], 2);
        assert_relative_eq!(e.error_rate(), 0.25);
        assert_relative_eq!(e.class_stats(0).error_rate().unwrap(), 0.5);
        assert_relative_eq!(e.class_stats(1).error_rate().unwrap(), 0.0);
        assert_relative_eq!(e.mean_class_error(), 0.25);
    }

    #[test]
    fn chunked_predictions_match_single_samples() {
        use crate::activation::ActivationFunction;
        use crate::network::{LayerSpec, NetworkSpec};

        let dbn = NetworkSpec::new(
            "eval",
            vec![LayerSpec::Dense { input: 3, output: 4, activation: ActivationFunction::Softmax }],
            9,
        )
        .build()
        .unwrap();
        let samples: Vec<Vec<f64>> = (0..11)
            .map(|i| (0..3).map(|j| ((i * 5 + j * 3) % 7) as f64 - 3.0).collect())
            .collect();

        let expected: Vec<usize> = samples.iter().map(|s| dbn.predict(s)).collect();
        for chunk in [1, 4, 11, 64] {
            let got: Vec<usize> = predictions(&dbn, &samples, chunk).collect();
            assert_eq!(got, expected, "chunk {}", chunk);
        }

        let labels = expected.clone();
        assert_eq!(evaluate(&dbn, &samples, &labels).unwrap().errors, 0);
    }

    #[test]
    fn classes_without_samples_do_not_count() {
        let e = evaluation(&[(0, 0), (0, 2), (2, 2)], 3);
        assert_eq!(e.class_stats(1).error_rate(), None);
        assert_relative_eq!(e.mean_class_error(), 0.25);
        assert!(e.to_string().contains("Mean class error"));
    }
}
