use std::ops::Range;

use ndarray::{Array2, Axis, s};
use serde::{Deserialize, Serialize};

/// Label reported for anchors of a cohort without state labels.
pub const UNKNOWN_LABEL: f32 = -1.0;

/// State labels of a cohort, one scalar per sample or one value per timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum StateLabels {
    /// `[sample]`
    PerSample(Vec<f32>),
    /// `[sample, time]`
    PerTimestep(Array2<f32>),
}

impl StateLabels {
    /// Number of labelled samples.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::PerSample(values) => values.len(),
            Self::PerTimestep(values) => values.nrows(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label of the anchor window `window` of sample `sample`.
    ///
    /// Per-timestep labels are averaged over the window and rounded half to even.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use tnc_series::StateLabels;
    ///
    /// let labels = StateLabels::PerTimestep(array![[0.0, 0.0, 1.0, 1.0, 1.0, 2.0]]);
    /// assert_eq!(labels.window_label(0, 1..5), 1.0);
    /// assert_eq!(labels.window_label(0, 0..4), 0.0);
    ///
    /// let labels = StateLabels::PerSample(vec![3.0, 1.0]);
    /// assert_eq!(labels.window_label(1, 0..4), 1.0);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn window_label(&self, sample: usize, window: Range<usize>) -> f32 {
        match self {
            Self::PerSample(values) => values[sample],
            Self::PerTimestep(values) => {
                let len = window.len();
                let sum = values.slice(s![sample, window]).sum();
                (sum / len as f32).round_ties_even()
            }
        }
    }

    /// Returns whether any label of `sample` equals `1`.
    ///
    /// This is the sample-level outcome used by the downstream classifier.
    #[must_use]
    pub fn is_positive(&self, sample: usize) -> bool {
        match self {
            Self::PerSample(values) => values[sample] == 1.0,
            Self::PerTimestep(values) => values.row(sample).iter().any(|v| *v == 1.0),
        }
    }

    /// Labels of the given samples, in order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        match self {
            Self::PerSample(values) => Self::PerSample(indices.iter().map(|&i| values[i]).collect()),
            Self::PerTimestep(values) => Self::PerTimestep(values.select(Axis(0), indices)),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_half_rounds_to_even() {
        let labels = StateLabels::PerTimestep(array![[0.0, 1.0, 1.0, 2.0]]);
        // mean 0.5 -> 0, mean 1.5 -> 2
        assert_eq!(labels.window_label(0, 0..2), 0.0);
        assert_eq!(labels.window_label(0, 2..4), 2.0);
    }

    #[test]
    fn test_is_positive() {
        let labels = StateLabels::PerTimestep(array![[0.0, 0.0, 1.0], [0.0, 2.0, 0.0]]);
        assert!(labels.is_positive(0));
        assert!(!labels.is_positive(1));
    }

    #[test]
    fn test_select_reorders() {
        let labels = StateLabels::PerSample(vec![0.0, 1.0, 2.0]);
        assert_eq!(labels.select(&[2, 0]), StateLabels::PerSample(vec![2.0, 0.0]));

        let labels = StateLabels::PerTimestep(array![[0.0, 0.0], [1.0, 1.0]]);
        assert_eq!(
            labels.select(&[1]),
            StateLabels::PerTimestep(array![[1.0, 1.0]])
        );
    }
}
