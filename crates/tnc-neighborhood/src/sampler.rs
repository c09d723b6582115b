//! Positive and negative window sampling around an anchor.
//!
//! Positives are drawn from `t + N(0, h)` and clamped so their windows stay inside the
//! valid range. Negatives come from outside `[t - h, t + h]`, keeping one window of
//! margin from the range edges:
//!
//! ```text
//!   start   start+ws        t-h      t      t+h          end-ws    end
//!     |--------[== left ==)~~~~~~~~~~|~~~~~~~~~~(== right ==)-------|
//! ```
//!
//! The simple sampler draws every negative from the side opposite the anchor's half.
//! The correlation-aware sampler splits draws between both sides in proportion to
//! their widths and rejects candidates that are still autocorrelated with the anchor.

use std::ops::Range;

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tnc_series::ValidRange;

use crate::AcfProfile;

/// How a negative set was completed when regular sampling could not fill it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NegativeFallback {
    /// The sampling interval was empty; a single window at the range edge was used.
    Degenerate,
    /// Every candidate was rejected; the least correlated candidates were kept.
    LeastCorrelated,
}

/// Negative window centers for one anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeDraw {
    /// Never empty.
    pub centers: Vec<usize>,
    /// Candidates rejected by the correlation filter (`None` when not filtering).
    pub removed: Option<usize>,
    pub fallback: Option<NegativeFallback>,
}

impl NegativeDraw {
    /// Repeats the centers cyclically until there are exactly `count` of them.
    #[must_use]
    pub fn padded(mut self, count: usize) -> Self {
        self.centers = repeat_to(&self.centers, count);
        self
    }
}

fn repeat_to(centers: &[usize], count: usize) -> Vec<usize> {
    assert!(!centers.is_empty(), "cannot repeat an empty center set");
    centers.iter().copied().cycle().take(count).collect()
}

/// Intervals of negative centers on each side of the neighborhood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeIntervals {
    pub left: Range<usize>,
    pub right: Range<usize>,
}

impl NegativeIntervals {
    /// Computes `[start + ws, t - h)` and `(t + h, end - ws)`; either may be empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use tnc_neighborhood::sampler::NegativeIntervals;
    /// use tnc_series::ValidRange;
    ///
    /// let intervals = NegativeIntervals::new(100, ValidRange::new(0, 200), 10, 30);
    /// assert_eq!(intervals.left, 10..70);
    /// assert_eq!(intervals.right, 131..190);
    /// ```
    #[must_use]
    pub fn new(t: usize, range: ValidRange, window_size: usize, half_width: usize) -> Self {
        let left_lo = range.start + window_size;
        let left_hi = t.saturating_sub(half_width).max(left_lo);
        let right_hi = range.end.saturating_sub(window_size);
        let right_lo = (t + half_width + 1).min(right_hi);
        Self {
            left: left_lo..left_hi,
            right: right_lo..right_hi,
        }
    }
}

/// Draws `count` positive centers from `t + N(0, half_width)`, clamped into `range`.
#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn sample_positive_centers<R>(
    rng: &mut R,
    t: usize,
    range: ValidRange,
    window_size: usize,
    half_width: usize,
    count: usize,
) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    (0..count)
        .map(|_| {
            let z: f64 = rng.sample(StandardNormal);
            let center = (t as f64 + z * half_width as f64) as i64;
            range.clamp_center(center, window_size)
        })
        .collect()
}

/// Draws negatives from the side of the range opposite to the anchor.
///
/// Anchors past the midpoint of `range` take negatives from the left interval, others
/// from the right. An empty interval yields a single window adjacent to the range edge.
pub fn sample_negative_centers<R>(
    rng: &mut R,
    t: usize,
    range: ValidRange,
    window_size: usize,
    half_width: usize,
    count: usize,
) -> NegativeDraw
where
    R: Rng + ?Sized,
{
    let intervals = NegativeIntervals::new(t, range, window_size, half_width);
    let interval = if t > range.midpoint() {
        intervals.left
    } else {
        intervals.right
    };
    if interval.is_empty() {
        return degenerate(rng, t, range, window_size);
    }
    NegativeDraw {
        centers: (0..count)
            .map(|_| rng.random_range(interval.clone()))
            .collect(),
        removed: None,
        fallback: None,
    }
}

/// Draws negatives from both sides and rejects candidates correlated with the anchor.
///
/// A candidate `t'` is rejected when `|acf[|t - t'|]| > out_threshold`. Surviving
/// candidates are repeated to `count`; if none survives, all candidates are kept in
/// order of increasing `|acf|`.
///
/// # Panics
///
/// Panics if the fallback produces no candidate.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#[expect(clippy::too_many_arguments)]
pub fn sample_filtered_negative_centers<R>(
    rng: &mut R,
    t: usize,
    range: ValidRange,
    window_size: usize,
    half_width: usize,
    count: usize,
    profile: &AcfProfile,
    out_threshold: f64,
) -> NegativeDraw
where
    R: Rng + ?Sized,
{
    let NegativeIntervals { left, right } = NegativeIntervals::new(t, range, window_size, half_width);
    let total = left.len() + right.len();
    if total == 0 {
        return degenerate(rng, t, range, window_size);
    }

    let n_right = (count as f64 * right.len() as f64 / total as f64) as usize;
    let n_left = count - n_right;
    let mut candidates = (0..n_left)
        .map(|_| rng.random_range(left.clone()))
        .collect::<Vec<_>>();
    candidates.extend((0..n_right).map(|_| rng.random_range(right.clone())));

    let correlation = |center: usize| profile.at_lag(t.abs_diff(center)).abs();
    let kept = candidates
        .iter()
        .copied()
        .filter(|c| correlation(*c) <= out_threshold)
        .collect::<Vec<_>>();
    let removed = candidates.len() - kept.len();

    if !kept.is_empty() {
        return NegativeDraw {
            centers: repeat_to(&kept, count),
            removed: Some(removed),
            fallback: None,
        };
    }

    let mut ranked = candidates;
    ranked.sort_by(|a, b| correlation(*a).total_cmp(&correlation(*b)));
    ranked.truncate(count);
    assert!(!ranked.is_empty(), "no negative candidate for anchor {t}");
    tracing::debug!(t, removed, "all negatives rejected; keeping least correlated");
    NegativeDraw {
        centers: repeat_to(&ranked, count),
        removed: Some(removed),
        fallback: Some(NegativeFallback::LeastCorrelated),
    }
}

/// A single window adjacent to the range edge on the side away from the anchor,
/// shifted inwards by a random offset below `window_size / 5`.
fn degenerate<R>(rng: &mut R, t: usize, range: ValidRange, window_size: usize) -> NegativeDraw
where
    R: Rng + ?Sized,
{
    let offset = rng.random_range(0..(window_size / 5).max(1));
    let window_start = if t > range.midpoint() {
        range.start + offset
    } else {
        range.end.saturating_sub(offset + window_size)
    };
    let center = window_start + window_size / 2;
    let center = range.clamp_center(i64::try_from(center).unwrap_or(i64::MAX), window_size);
    tracing::debug!(t, center, "empty negative interval; using a single edge window");
    NegativeDraw {
        centers: vec![center],
        removed: None,
        fallback: Some(NegativeFallback::Degenerate),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_simple_negatives_outside_neighborhood() {
        // T = 200, ws = 10, eta = 1 => h = 30
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        let range = ValidRange::new(0, 200);
        for t in [20, 60, 100, 101, 140, 179] {
            let draw = sample_negative_centers(&mut rng, t, range, 10, 30, 20);
            assert_eq!(draw.centers.len(), 20);
            assert_eq!(draw.fallback, None);
            for c in draw.centers {
                assert!((10..190).contains(&c), "t={t} c={c}");
                assert!(c.abs_diff(t) > 30, "t={t} c={c}");
                assert!(range.contains_window(c, 10));
            }
        }
    }

    #[test]
    fn test_anchor_in_first_half_takes_right_side() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let draw = sample_negative_centers(&mut rng, 100, ValidRange::new(0, 200), 10, 30, 50);
        assert!(draw.centers.iter().all(|c| *c > 130 && *c < 190));
    }

    #[test]
    fn test_positives_stay_in_range() {
        let mut rng = Pcg64Mcg::seed_from_u64(2);
        let range = ValidRange::new(13, 97);
        let centers = sample_positive_centers(&mut rng, 40, range, 10, 300, 500);
        assert!(centers.iter().all(|c| range.contains_window(*c, 10)));
        // a huge spread must hit both clamps
        assert!(centers.contains(&range.min_center(10)));
        assert!(centers.contains(&range.max_center(10)));
    }

    #[test]
    fn test_empty_interval_falls_back_to_single_window() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let range = ValidRange::new(0, 80);
        let draw = sample_negative_centers(&mut rng, 40, range, 10, 100, 20);
        assert_eq!(draw.fallback, Some(NegativeFallback::Degenerate));
        assert_eq!(draw.centers.len(), 1);
        assert!(range.contains_window(draw.centers[0], 10));

        let padded = draw.padded(20);
        assert_eq!(padded.centers.len(), 20);
        assert!(padded.centers.iter().all(|c| *c == padded.centers[0]));
    }

    #[test]
    fn test_filtered_negatives_respect_threshold() {
        // correlation decays linearly over 100 lags
        #[expect(clippy::cast_precision_loss)]
        let curve = (0..200).map(|lag| (1.0 - lag as f64 / 100.0).max(0.0)).collect();
        let profile = AcfProfile::from_curve(curve);
        let mut rng = Pcg64Mcg::seed_from_u64(4);
        let range = ValidRange::new(0, 200);
        let draw = sample_filtered_negative_centers(&mut rng, 100, range, 10, 20, 40, &profile, 0.5);
        assert_eq!(draw.fallback, None);
        assert_eq!(draw.centers.len(), 40);
        for c in &draw.centers {
            assert!(profile.at_lag(c.abs_diff(100)) <= 0.5);
            assert!(c.abs_diff(100) > 20);
        }
        assert!(draw.removed.unwrap() > 0);
    }

    #[test]
    fn test_filtered_negatives_split_by_width() {
        let profile = AcfProfile::from_curve(vec![0.0; 400]);
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        // left interval 10..40 (30 wide), right interval 81..390 (309 wide)
        let draw =
            sample_filtered_negative_centers(&mut rng, 60, ValidRange::new(0, 400), 10, 20, 20, &profile, 0.5);
        let left = draw.centers.iter().filter(|c| **c < 60).count();
        assert_eq!(left, 20 - 20 * 309 / 339);
        assert_eq!(draw.removed, Some(0));
    }

    #[test]
    fn test_filtered_negatives_left_draws_first() {
        let profile = AcfProfile::from_curve(vec![0.0; 400]);
        let draw = |seed| {
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            sample_filtered_negative_centers(&mut rng, 60, ValidRange::new(0, 400), 10, 20, 20, &profile, 0.5)
        };
        let first = draw(8);
        assert_eq!(first.centers, draw(8).centers);
        let n_left = 20 - 20 * 309 / 339;
        assert!(first.centers[..n_left].iter().all(|c| (10..40).contains(c)));
        assert!(first.centers[n_left..].iter().all(|c| (81..390).contains(c)));
    }

    #[test]
    fn test_all_rejected_keeps_least_correlated() {
        let profile = AcfProfile::from_curve(vec![1.0; 200]);
        let mut rng = Pcg64Mcg::seed_from_u64(6);
        let draw = sample_filtered_negative_centers(
            &mut rng,
            100,
            ValidRange::new(0, 200),
            10,
            20,
            10,
            &profile,
            0.5,
        );
        assert_eq!(draw.fallback, Some(NegativeFallback::LeastCorrelated));
        assert_eq!(draw.removed, Some(10));
        assert_eq!(draw.centers.len(), 10);
    }

    #[test]
    fn test_filtered_degenerate_range() {
        let profile = AcfProfile::from_curve(vec![0.0; 60]);
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let draw =
            sample_filtered_negative_centers(&mut rng, 30, ValidRange::new(0, 60), 10, 50, 5, &profile, 0.5);
        assert_eq!(draw.fallback, Some(NegativeFallback::Degenerate));
        assert_eq!(draw.centers.len(), 1);
    }
}
