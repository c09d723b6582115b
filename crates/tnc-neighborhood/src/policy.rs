use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// Default p-value below which a window counts as stationary.
pub const DEFAULT_ADF_THRESHOLD: f64 = 0.01;
/// Default autocorrelation level that bounds the neighborhood.
pub const DEFAULT_ACF_THRESHOLD: f64 = 0.4;
/// Default autocorrelation level above which a negative is treated as a false negative.
pub const DEFAULT_ACF_OUT_THRESHOLD: f64 = 0.4;

/// How the neighborhood half-width around an anchor is chosen.
///
/// Exactly one policy is active for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NeighborhoodPolicy {
    /// `half_width = 3 · window_size · eta`.
    Fixed { eta: usize },
    /// Grow the radius until the Augmented Dickey-Fuller test calls the window stationary.
    Adf { threshold: f64 },
    /// Size the neighborhood by the lag where the sample's autocorrelation drops below
    /// `threshold`.
    Acf { threshold: f64 },
    /// As [`Acf`](Self::Acf), and additionally reject negatives whose lag still has
    /// `|acf| > out_threshold`.
    AcfPlus {
        in_threshold: f64,
        out_threshold: f64,
    },
}

impl NeighborhoodPolicy {
    /// Returns whether datasets need per-sample autocorrelation profiles.
    #[must_use]
    pub fn uses_acf(&self) -> bool {
        matches!(self, Self::Acf { .. } | Self::AcfPlus { .. })
    }

    /// Returns whether negatives are filtered for false negatives.
    ///
    /// Training uses the plain two-term objective in that case.
    #[must_use]
    pub fn filters_negatives(&self) -> bool {
        self.is_acf_plus()
    }

    /// Short tag used in run names.
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::Fixed { eta } => format!("eta{eta}"),
            Self::Adf { .. } => "adf".to_owned(),
            Self::Acf { .. } => "acf".to_owned(),
            Self::AcfPlus { .. } => "acfplus".to_owned(),
        }
    }
}

/// Flag-style policy selection, as found in run configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyFlags {
    pub eta: Option<usize>,
    pub adf: bool,
    pub acf: bool,
    pub acf_plus: bool,
    pub acf_threshold: f64,
    pub acf_out_threshold: f64,
}

impl Default for PolicyFlags {
    fn default() -> Self {
        Self {
            eta: None,
            adf: true,
            acf: false,
            acf_plus: false,
            acf_threshold: DEFAULT_ACF_THRESHOLD,
            acf_out_threshold: DEFAULT_ACF_OUT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum PolicyError {
    #[display("ADF cannot be combined with ACF-based neighborhoods")]
    Conflicting,
    #[display("a fixed neighborhood requires `eta`")]
    MissingEta,
    #[display("eta must be positive")]
    ZeroEta,
}

impl PolicyFlags {
    /// Resolves the flags into a single policy.
    ///
    /// - `adf` together with `acf` or `acf_plus` is rejected.
    /// - `acf_plus` takes precedence over `acf`.
    /// - With no statistical flag set, `eta` selects a fixed neighborhood.
    ///
    /// # Examples
    ///
    /// ```
    /// use tnc_neighborhood::{NeighborhoodPolicy, PolicyFlags};
    ///
    /// let flags = PolicyFlags {
    ///     adf: false,
    ///     acf: true,
    ///     acf_plus: true,
    ///     ..PolicyFlags::default()
    /// };
    /// assert!(flags.resolve().unwrap().is_acf_plus());
    ///
    /// let flags = PolicyFlags { adf: false, eta: Some(2), ..PolicyFlags::default() };
    /// assert_eq!(flags.resolve().unwrap(), NeighborhoodPolicy::Fixed { eta: 2 });
    /// ```
    pub fn resolve(&self) -> Result<NeighborhoodPolicy, PolicyError> {
        if self.adf && (self.acf || self.acf_plus) {
            return Err(PolicyError::Conflicting);
        }
        let policy = if self.acf_plus {
            NeighborhoodPolicy::AcfPlus {
                in_threshold: self.acf_threshold,
                out_threshold: self.acf_out_threshold,
            }
        } else if self.acf {
            NeighborhoodPolicy::Acf {
                threshold: self.acf_threshold,
            }
        } else if self.adf {
            NeighborhoodPolicy::Adf {
                threshold: DEFAULT_ADF_THRESHOLD,
            }
        } else {
            match self.eta {
                None => return Err(PolicyError::MissingEta),
                Some(0) => return Err(PolicyError::ZeroEta),
                Some(eta) => NeighborhoodPolicy::Fixed { eta },
            }
        };
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adf_with_acf_conflicts() {
        for (acf, acf_plus) in [(true, false), (false, true), (true, true)] {
            let flags = PolicyFlags {
                adf: true,
                acf,
                acf_plus,
                ..PolicyFlags::default()
            };
            assert_eq!(flags.resolve(), Err(PolicyError::Conflicting));
        }
    }

    #[test]
    fn test_default_is_adf() {
        assert_eq!(
            PolicyFlags::default().resolve(),
            Ok(NeighborhoodPolicy::Adf { threshold: 0.01 })
        );
    }

    #[test]
    fn test_fixed_requires_eta() {
        let flags = PolicyFlags {
            adf: false,
            ..PolicyFlags::default()
        };
        assert_eq!(flags.resolve(), Err(PolicyError::MissingEta));
    }

    #[test]
    fn test_serde_tagged() {
        let policy: NeighborhoodPolicy =
            serde_json::from_str(r#"{"kind":"acf_plus","in_threshold":0.4,"out_threshold":0.5}"#)
                .unwrap();
        assert!(policy.uses_acf());
        assert!(policy.filters_negatives());
    }
}
