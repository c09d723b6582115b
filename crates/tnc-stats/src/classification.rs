//! Binary classification metrics.
//!
//! - [`roc_auc`]: area under the ROC curve (Mann-Whitney formulation, ties count half)
//! - [`pr_auc`]: area under the precision-recall curve by trapezoidal integration
//! - [`ClassificationReport`]: per-class precision, recall, F1 and support at a threshold

use std::fmt;

/// Computes the area under the ROC curve.
///
/// Returns `None` unless both classes are present.
///
/// # Panics
///
/// Panics if `labels` and `scores` differ in length.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    assert_eq!(labels.len(), scores.len());
    let n_pos = labels.iter().filter(|l| **l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order = (0..scores.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // average 1-based ranks over tied groups
    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        pos_rank_sum += order[i..=j]
            .iter()
            .filter(|&&k| labels[k])
            .count() as f64
            * avg_rank;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let u = pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg as f64))
}

/// Computes the area under the precision-recall curve.
///
/// The curve is traced from the highest threshold down until full recall is reached,
/// starting at `(recall 0, precision 1)`, and integrated with the trapezoidal rule.
///
/// Returns `None` if there are no positive labels.
///
/// # Examples
///
/// ```
/// use tnc_stats::classification::pr_auc;
///
/// let labels = [false, true, false, true];
/// let perfect = [0.1, 0.9, 0.2, 0.8];
/// assert_eq!(pr_auc(&labels, &perfect), Some(1.0));
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn pr_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    assert_eq!(labels.len(), scores.len());
    let total_pos = labels.iter().filter(|l| **l).count();
    if total_pos == 0 {
        return None;
    }

    let mut order = (0..scores.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut area = 0.0;
    let (mut prev_recall, mut prev_precision) = (0.0, 1.0);
    let (mut tp, mut fp) = (0_usize, 0_usize);
    let mut i = 0;
    while i < order.len() && tp < total_pos {
        // consume a whole group of tied scores at once
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if labels[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let recall = tp as f64 / total_pos as f64;
        let precision = tp as f64 / (tp + fp) as f64;
        area += (recall - prev_recall) * (precision + prev_precision) / 2.0;
        prev_recall = recall;
        prev_precision = precision;
    }
    Some(area)
}

/// Precision, recall, F1 and support for one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics of hard predictions obtained by thresholding scores.
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    /// Display names of the negative and positive class.
    pub class_names: [String; 2],
    /// Metrics for the negative (index 0) and positive (index 1) class.
    pub classes: [ClassMetrics; 2],
    /// Fraction of correct predictions.
    pub accuracy: f64,
}

impl ClassificationReport {
    /// Builds a report predicting the positive class when `score >= threshold`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tnc_stats::classification::ClassificationReport;
    ///
    /// let labels = [false, false, true, true];
    /// let scores = [0.2, 0.7, 0.9, 0.6];
    /// let report = ClassificationReport::new(&labels, &scores, 0.5, ["normal", "event"]);
    /// assert_eq!(report.classes[1].recall, 1.0);
    /// assert_eq!(report.classes[0].recall, 0.5);
    /// assert_eq!(report.accuracy, 0.75);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(labels: &[bool], scores: &[f64], threshold: f64, class_names: [&str; 2]) -> Self {
        assert_eq!(labels.len(), scores.len());
        let mut counts = [[0_usize; 2]; 2]; // [actual][predicted]
        for (&label, &score) in labels.iter().zip(scores) {
            counts[usize::from(label)][usize::from(score >= threshold)] += 1;
        }

        let class = |c: usize| {
            let other = 1 - c;
            let tp = counts[c][c] as f64;
            let predicted = tp + counts[other][c] as f64;
            let support = counts[c][c] + counts[c][other];
            let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
            let recall = if support > 0 {
                tp / support as f64
            } else {
                0.0
            };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                precision,
                recall,
                f1,
                support,
            }
        };

        let total = labels.len().max(1) as f64;
        Self {
            class_names: class_names.map(str::to_owned),
            classes: [class(0), class(1)],
            accuracy: (counts[0][0] + counts[1][1]) as f64 / total,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .class_names
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(8);
        writeln!(
            f,
            "{:>width$}  precision  recall  f1-score  support",
            ""
        )?;
        for (name, m) in self.class_names.iter().zip(&self.classes) {
            writeln!(
                f,
                "{name:>width$}  {:>9.2}  {:>6.2}  {:>8.2}  {:>7}",
                m.precision, m.recall, m.f1, m.support
            )?;
        }
        let support = self.classes[0].support + self.classes[1].support;
        write!(
            f,
            "{:>width$}  {:>9}  {:>6}  {:>8.2}  {:>7}",
            "accuracy", "", "", self.accuracy, support
        )
    }
}
