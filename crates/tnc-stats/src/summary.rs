use std::fmt;

/// Mean and standard deviation of a set of scores.
///
/// Used to report performance across cross-validation folds as `mean ± std`.
/// The standard deviation is the population standard deviation (divides by `n`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanStd {
    /// The arithmetic mean.
    pub mean: f64,
    /// The population standard deviation.
    pub std: f64,
    /// Number of values summarized.
    pub count: usize,
}

impl MeanStd {
    /// Summarizes the given values.
    ///
    /// Returns `None` if `values` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use tnc_stats::summary::MeanStd;
    ///
    /// let summary = MeanStd::new([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
    /// assert_eq!(summary.mean, 5.0);
    /// assert_eq!(summary.std, 2.0);
    /// assert!(MeanStd::new([]).is_none());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std: variance.sqrt(),
            count: values.len(),
        })
    }

    /// Returns a copy with mean and standard deviation multiplied by `factor`.
    ///
    /// Handy for reporting fractions as percentages.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            mean: self.mean * factor,
            std: self.std * factor.abs(),
            count: self.count,
        }
    }
}

impl fmt::Display for MeanStd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(4);
        write!(
            f,
            "{:.precision$} +- {:.precision$}",
            self.mean, self.std
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_value_has_zero_std() {
        let summary = MeanStd::new([0.42]).unwrap();
        assert_eq!(summary.mean, 0.42);
        assert_eq!(summary.std, 0.0);
        assert_eq!(summary.count, 1);
    }

    #[test]
    fn test_display_respects_precision() {
        let summary = MeanStd::new([1.0, 3.0]).unwrap();
        assert_eq!(format!("{summary:.2}"), "2.00 +- 1.00");
        assert_eq!(format!("{summary}"), "2.0000 +- 1.0000");
    }

    #[test]
    fn test_scaled_to_percent() {
        let summary = MeanStd::new([0.5, 0.7]).unwrap().scaled(100.0);
        assert!((summary.mean - 60.0).abs() < 1e-9);
        assert!((summary.std - 10.0).abs() < 1e-9);
    }
}
