use std::fmt;

/// Square table of counts: rows are true classes, columns predicted classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    classes: usize,
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(classes: usize) -> ConfusionMatrix {
        ConfusionMatrix { classes, counts: vec![0; classes * classes] }
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Records one prediction.
    ///
    /// # Panics
    /// Panics if either class is out of range.
    pub fn add(&mut self, actual: usize, predicted: usize) {
        assert!(
            actual < self.classes && predicted < self.classes,
            "class out of range: {} / {} for {} classes",
            actual,
            predicted,
            self.classes
        );
        self.counts[actual * self.classes + predicted] += 1;
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual * self.classes + predicted]
    }

    /// Number of samples whose true class is `actual`.
    pub fn row_sum(&self, actual: usize) -> usize {
        self.counts[actual * self.classes..(actual + 1) * self.classes].iter().sum()
    }

    pub fn correct(&self, class: usize) -> usize {
        self.get(class, class)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Every row divided by its sum, in percent. Empty rows stay at zero.
    pub fn percentages(&self) -> Vec<Vec<f64>> {
        (0..self.classes)
            .map(|r| {
                let sum = self.row_sum(r);
                (0..self.classes)
                    .map(|c| {
                        if sum == 0 {
                            0.0
                        } else {
                            100.0 * self.get(r, c) as f64 / sum as f64
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}", "")?;
        for c in 0..self.classes {
            write!(f, " {:>7}", format!("P:{}", c))?;
        }
        writeln!(f)?;
        for (r, row) in self.percentages().iter().enumerate() {
            write!(f, "{:>6}", format!("T:{}", r))?;
            for v in row {
                write!(f, " {:>6.2}%", v)?;
            }
            if r + 1 < self.classes {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rows_normalize_to_percentages() {
        let mut cm = ConfusionMatrix::new(2);
        cm.add(0, 0);
        cm.add(0, 0);
        cm.add(0, 1);
        cm.add(1, 1);
        assert_eq!(cm.row_sum(0), 3);
        assert_eq!(cm.total(), 4);

        let pct = cm.percentages();
        assert_relative_eq!(pct[0][0], 200.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(pct[1][1], 100.0);
    }

    #[test]
    fn empty_rows_stay_at_zero() {
        let mut cm = ConfusionMatrix::new(3);
        cm.add(2, 0);
        assert_eq!(cm.percentages()[1], vec![0.0, 0.0, 0.0]);
        assert!(cm.to_string().contains("T:2"));
    }
}
