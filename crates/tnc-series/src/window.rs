use std::ops::{Range, RangeInclusive};

use serde::{Deserialize, Serialize};

/// Returns the timesteps covered by the window of `window_size` centered at `center`.
///
/// A window always covers exactly `window_size` timesteps: it starts `window_size / 2`
/// steps before its center. For odd sizes the center sits just left of the middle.
///
/// # Panics
///
/// Panics if the window would start before timestep 0.
///
/// # Examples
///
/// ```
/// use tnc_series::window_bounds;
///
/// assert_eq!(window_bounds(10, 4), 8..12);
/// assert_eq!(window_bounds(10, 5), 8..13);
/// ```
#[must_use]
pub fn window_bounds(center: usize, window_size: usize) -> Range<usize> {
    let start = center
        .checked_sub(window_size / 2)
        .expect("window must not start before timestep 0");
    start..start + window_size
}

/// The sub-range `[start, end)` of a sample that contains observed data.
///
/// Leading and trailing timesteps where every feature is missing are outside the
/// range. Interior gaps are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidRange {
    pub start: usize,
    pub end: usize,
}

impl ValidRange {
    /// Creates a range, asserting `start <= end`.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "invalid range {start}..{end}");
        Self { start, end }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Midpoint used to decide which side of an anchor negatives come from.
    #[must_use]
    pub const fn midpoint(&self) -> usize {
        self.start + (self.end - self.start) / 2
    }

    /// Smallest center whose window fits in the range.
    #[must_use]
    pub const fn min_center(&self, window_size: usize) -> usize {
        self.start + window_size / 2
    }

    /// Largest center whose window fits in the range.
    ///
    /// # Panics
    ///
    /// Panics if the range is shorter than one window.
    #[must_use]
    pub fn max_center(&self, window_size: usize) -> usize {
        assert!(
            self.len() >= window_size,
            "range of length {} cannot hold a window of {window_size}",
            self.len()
        );
        self.end - window_size + window_size / 2
    }

    /// All centers whose window fits in the range, or `None` if no window fits.
    ///
    /// # Examples
    ///
    /// ```
    /// use tnc_series::ValidRange;
    ///
    /// let range = ValidRange::new(0, 200);
    /// assert_eq!(range.window_centers(10), Some(5..=195));
    /// assert_eq!(ValidRange::new(3, 7).window_centers(10), None);
    /// ```
    #[must_use]
    pub fn window_centers(&self, window_size: usize) -> Option<RangeInclusive<usize>> {
        (self.len() >= window_size)
            .then(|| self.min_center(window_size)..=self.max_center(window_size))
    }

    /// Moves `center` onto the nearest center whose window fits in the range.
    #[must_use]
    pub fn clamp_center(&self, center: i64, window_size: usize) -> usize {
        let lo = i64::try_from(self.min_center(window_size)).unwrap_or(i64::MAX);
        let hi = i64::try_from(self.max_center(window_size)).unwrap_or(i64::MAX);
        // both bounds are non-negative
        usize::try_from(center.clamp(lo, hi)).unwrap_or_default()
    }

    /// Returns whether the window centered at `center` lies entirely in the range.
    #[must_use]
    pub fn contains_window(&self, center: usize, window_size: usize) -> bool {
        center >= window_size / 2 && {
            let bounds = window_bounds(center, window_size);
            bounds.start >= self.start && bounds.end <= self.end
        }
    }

    /// Centers an anchor may be drawn from: `[start + 2·ws, end - 2·ws)`.
    ///
    /// Returns `None` if this interval is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use tnc_series::ValidRange;
    ///
    /// assert_eq!(ValidRange::new(0, 200).anchor_centers(10), Some(20..180));
    /// assert_eq!(ValidRange::new(0, 40).anchor_centers(10), None);
    /// ```
    #[must_use]
    pub fn anchor_centers(&self, window_size: usize) -> Option<Range<usize>> {
        let lo = self.start + 2 * window_size;
        let hi = self.end.checked_sub(2 * window_size)?;
        (lo < hi).then_some(lo..hi)
    }
}
