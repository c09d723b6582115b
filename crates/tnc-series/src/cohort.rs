use ndarray::{Array4, Axis};
use rand::{Rng, seq::SliceRandom as _};
use serde::{Deserialize, Serialize};

use crate::{SeriesError, StateLabels, TimeSeries};

/// A collection of equally shaped time series with optional state labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCohort")]
pub struct Cohort {
    samples: Vec<TimeSeries>,
    labels: Option<StateLabels>,
}

#[derive(Deserialize)]
struct RawCohort {
    samples: Vec<TimeSeries>,
    labels: Option<StateLabels>,
}

impl TryFrom<RawCohort> for Cohort {
    type Error = SeriesError;

    fn try_from(raw: RawCohort) -> Result<Self, Self::Error> {
        Self::new(raw.samples, raw.labels)
    }
}

impl Cohort {
    /// Creates a cohort, checking that all samples share one shape and that labels
    /// cover every sample.
    pub fn new(samples: Vec<TimeSeries>, labels: Option<StateLabels>) -> Result<Self, SeriesError> {
        if let Some(first) = samples.first() {
            let expected = first.values().shape().to_vec();
            for sample in &samples[1..] {
                let actual = sample.values().shape().to_vec();
                if actual != expected {
                    return Err(SeriesError::ShapeMismatch { expected, actual });
                }
            }
        }
        if let Some(labels) = &labels {
            if labels.len() != samples.len() {
                return Err(SeriesError::LabelCount {
                    labels: labels.len(),
                    samples: samples.len(),
                });
            }
            if let (StateLabels::PerTimestep(values), Some(first)) = (labels, samples.first())
                && values.ncols() != first.len()
            {
                return Err(SeriesError::ShapeMismatch {
                    expected: vec![samples.len(), first.len()],
                    actual: values.shape().to_vec(),
                });
            }
        }
        Ok(Self { samples, labels })
    }

    /// Creates a cohort from a `[sample, channel, feature, time]` array.
    pub fn from_array4(values: &Array4<f32>, labels: Option<StateLabels>) -> Result<Self, SeriesError> {
        let samples = values
            .axis_iter(Axis(0))
            .map(|sample| TimeSeries::new(sample.to_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(samples, labels)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn samples(&self) -> &[TimeSeries] {
        &self.samples
    }

    #[must_use]
    pub fn labels(&self) -> Option<&StateLabels> {
        self.labels.as_ref()
    }

    /// Number of timesteps per sample (`0` for an empty cohort).
    #[must_use]
    pub fn series_len(&self) -> usize {
        self.samples.first().map_or(0, TimeSeries::len)
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.samples.first().map_or(0, TimeSeries::num_features)
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.samples.first().map_or(0, TimeSeries::num_channels)
    }

    /// Samples and labels at `indices`, in that order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            samples: indices.iter().map(|&i| self.samples[i].clone()).collect(),
            labels: self.labels.as_ref().map(|labels| labels.select(indices)),
        }
    }

    /// Returns a copy with samples (and their labels) in random order.
    #[must_use]
    pub fn shuffled<R>(&self, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut indices = (0..self.len()).collect::<Vec<_>>();
        indices.shuffle(rng);
        self.select(&indices)
    }

    /// Splits into the leading `⌊fraction·len⌋` samples and the rest.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::Array4;
    /// use tnc_series::Cohort;
    ///
    /// let cohort = Cohort::from_array4(&Array4::zeros((10, 1, 2, 8)), None).unwrap();
    /// let (head, tail) = cohort.split_fraction(0.8);
    /// assert_eq!((head.len(), tail.len()), (8, 2));
    /// ```
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    #[must_use]
    pub fn split_fraction(&self, fraction: f64) -> (Self, Self) {
        assert!((0.0..=1.0).contains(&fraction), "fraction out of range: {fraction}");
        let head = ((self.len() as f64 * fraction) as usize).min(self.len());
        let indices = (0..self.len()).collect::<Vec<_>>();
        (self.select(&indices[..head]), self.select(&indices[head..]))
    }

    /// Sample-level binary outcomes ("any timestep labelled 1"), if labelled.
    #[must_use]
    pub fn outcomes(&self) -> Option<Vec<bool>> {
        let labels = self.labels.as_ref()?;
        Some((0..self.len()).map(|i| labels.is_positive(i)).collect())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array3, array};
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[expect(clippy::cast_precision_loss)]
    fn tagged_cohort(n: usize) -> Cohort {
        let samples = (0..n)
            .map(|i| TimeSeries::new(Array3::from_elem((1, 1, 4), i as f32)).unwrap())
            .collect();
        let labels = StateLabels::PerSample((0..n).map(|i| i as f32).collect());
        Cohort::new(samples, Some(labels)).unwrap()
    }

    #[test]
    fn test_shuffle_keeps_labels_aligned() {
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        let cohort = tagged_cohort(20).shuffled(&mut rng);
        let Some(StateLabels::PerSample(labels)) = cohort.labels() else {
            panic!("labels lost");
        };
        for (sample, label) in cohort.samples().iter().zip(labels) {
            assert_eq!(sample.values()[[0, 0, 0]], *label);
        }
    }

    #[test]
    fn test_label_count_checked() {
        let samples = vec![TimeSeries::from_data(Array2::zeros((1, 3))).unwrap()];
        let err = Cohort::new(samples, Some(StateLabels::PerSample(vec![0.0, 1.0]))).unwrap_err();
        assert_eq!(err, SeriesError::LabelCount { labels: 2, samples: 1 });
    }

    #[test]
    fn test_mixed_shapes_rejected() {
        let samples = vec![
            TimeSeries::from_data(Array2::zeros((1, 3))).unwrap(),
            TimeSeries::from_data(Array2::zeros((1, 4))).unwrap(),
        ];
        assert!(Cohort::new(samples, None).is_err());
    }

    #[test]
    fn test_outcomes() {
        let samples = vec![TimeSeries::from_data(Array2::zeros((1, 3))).unwrap(); 2];
        let labels = StateLabels::PerTimestep(array![[0.0, 0.0, 1.0], [0.0, 0.0, 0.0]]);
        let cohort = Cohort::new(samples, Some(labels)).unwrap();
        assert_eq!(cohort.outcomes(), Some(vec![true, false]));
    }

    #[test]
    fn test_json_roundtrip_revalidates() {
        let cohort = tagged_cohort(3);
        let json = serde_json::to_string(&cohort).unwrap();
        let back: Cohort = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cohort);

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["labels"]["values"] = serde_json::json!([0.0]);
        assert!(serde_json::from_value::<Cohort>(value).is_err());
    }
}
