//! Statistical tools used by the temporal neighborhood coding workspace.
//!
//! This crate provides the numerical building blocks the neighborhood sampler and
//! the evaluation code depend on:
//!
//! - **Autocorrelation**: sample autocorrelation function out to an arbitrary lag
//! - **Stationarity testing**: Augmented Dickey-Fuller test with AIC lag selection
//!   and MacKinnon approximate p-values
//! - **Summaries**: mean and standard deviation of a set of scores (e.g. across
//!   cross-validation folds)
//! - **Classification metrics**: AUROC, AUPRC and a per-class precision/recall report
//!
//! # Modules
//!
//! - [`acf`]: Autocorrelation function
//! - [`adf`]: Augmented Dickey-Fuller unit-root test
//! - [`summary`]: Mean ± standard deviation summaries
//! - [`classification`]: Binary classification metrics
//!
//! # Examples
//!
//! ## Computing an autocorrelation curve
//!
//! ```
//! use tnc_stats::acf::autocorrelation;
//!
//! let values = [1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0];
//! let acf = autocorrelation(&values, 4).unwrap();
//! assert_eq!(acf.len(), 5);
//! assert!((acf[0] - 1.0).abs() < 1e-12);
//! ```
//!
//! ## Summarizing fold scores
//!
//! ```
//! use tnc_stats::summary::MeanStd;
//!
//! let summary = MeanStd::new([0.8, 0.9, 1.0]).unwrap();
//! assert!((summary.mean - 0.9).abs() < 1e-12);
//! ```
//!
//! ## Ranking quality of a classifier
//!
//! ```
//! use tnc_stats::classification::roc_auc;
//!
//! let labels = [false, false, true, true];
//! let scores = [0.1, 0.4, 0.35, 0.8];
//! assert_eq!(roc_auc(&labels, &scores), Some(0.75));
//! ```

pub mod acf;
pub mod adf;
pub mod classification;
mod ols;
pub mod summary;
