//! Downstream classification on frozen encodings.
//!
//! Each sample is encoded once as a sequence of window encodings. Every batch then
//! cuts the sequences into sub-sequences of `rnn_window_size ∈ 1..=3` encodings
//! (re-drawn per batch), labels each sub-sequence with its sample's outcome, and
//! drops sub-sequences whose windows are mostly unobserved. A [`StatePredictor`]
//! (LSTM + linear head) is trained on them with class-weighted BCE.

use std::collections::BTreeMap;

use candle_core::{DType, Device, Tensor};
use candle_nn::{
    AdamW, LSTM, LSTMConfig, Linear, Module as _, Optimizer as _, ParamsAdamW, VarBuilder, VarMap,
};
use ndarray::{Array2, Array3};
use rand::{Rng, SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use tnc_series::Cohort;
use tnc_stats::{
    classification::{ClassificationReport, pr_auc, roc_auc},
    summary::MeanStd,
};

use crate::{
    RunContext, TrainError,
    batch::to_tensor,
    contrastive::{CHECKPOINT_INTERVAL, EncoderRecord},
    encoder::{self, Encoder, IMPUTED, last_hidden},
    loss,
};

const FOLD_SEED_STRIDE: u64 = 123;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub n_cross_val_classification: usize,
    pub batch_size: usize,
    pub n_epochs: usize,
    pub hidden_size: usize,
    pub lr: f64,
    pub decay: f64,
    /// Encodings kept from the end of a positive sample's sequence.
    pub num_pre_positive_encodings: usize,
    /// Timesteps between consecutive encoded windows.
    pub sliding_gap: usize,
    pub max_rnn_window_size: usize,
    pub validation_fraction: f64,
    /// Name of the positive class in classification reports.
    pub pos_sample_name: String,
    pub seed: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            n_cross_val_classification: 3,
            batch_size: 128,
            n_epochs: 100,
            hidden_size: 32,
            lr: 1e-3,
            decay: 5e-3,
            num_pre_positive_encodings: 12,
            sliding_gap: 20,
            max_rnn_window_size: 3,
            validation_fraction: 0.2,
            pos_sample_name: "positive".into(),
            seed: 0,
        }
    }
}

/// A sample's frozen sequence encoding and its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSample {
    /// `[num_windows, encoding_size]`
    pub encodings: Array2<f32>,
    pub validity: Vec<i8>,
    pub positive: bool,
}

/// Sub-sequences cut from a batch of encoded samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Subsequences {
    /// `[count, rnn_window_size, encoding_size]`
    pub windows: Array3<f32>,
    pub labels: Vec<f32>,
    /// Positive sub-sequences before unobserved ones were dropped.
    pub positive_count: usize,
    /// Negative sub-sequences before unobserved ones were dropped.
    pub negative_count: usize,
}

impl Subsequences {
    /// `n_negative / n_positive`, counting at least one positive.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn pos_weight(&self) -> f64 {
        self.negative_count as f64 / self.positive_count.max(1) as f64
    }
}

/// Most frequent validity of a sub-sequence; ties go to the smallest value, so an
/// even split between unobserved and observed windows counts as unobserved.
fn majority_validity(validity: &[i8]) -> i8 {
    let mut counts = BTreeMap::new();
    for v in validity {
        *counts.entry(*v).or_insert(0_usize) += 1;
    }
    let mut best = (IMPUTED, 0);
    for (value, count) in counts {
        if count > best.1 {
            best = (value, count);
        }
    }
    best.0
}

/// Cuts the samples into sub-sequences of `rnn_window_size` encodings.
///
/// Positive samples keep only their last `num_pre_positive_encodings` encodings.
/// Each sequence is clipped from the left to a multiple of `rnn_window_size`, and
/// sub-sequences whose majority validity is [`IMPUTED`] are dropped.
///
/// # Panics
///
/// Panics if the samples' encodings differ in width.
#[must_use]
pub fn build_subsequences(
    samples: &[&EncodedSample],
    rnn_window_size: usize,
    num_pre_positive_encodings: usize,
) -> Subsequences {
    assert!(rnn_window_size > 0, "rnn_window_size must be positive");
    let encoding_size = samples.first().map_or(0, |s| s.encodings.ncols());
    let mut data = Vec::new();
    let mut labels = Vec::new();
    let (mut positive_count, mut negative_count) = (0, 0);

    for sample in samples {
        let n = sample.validity.len();
        let kept = if sample.positive {
            n.min(num_pre_positive_encodings)
        } else {
            n
        };
        let start = n - kept + kept % rnn_window_size;
        let label = if sample.positive { 1.0 } else { 0.0 };
        for first in (start..n).step_by(rnn_window_size) {
            let rows = first..first + rnn_window_size;
            if sample.positive {
                positive_count += 1;
            } else {
                negative_count += 1;
            }
            if majority_validity(&sample.validity[rows.clone()]) == IMPUTED {
                continue;
            }
            for row in rows {
                data.extend(sample.encodings.row(row).iter().copied());
            }
            labels.push(label);
        }
    }

    let windows = Array3::from_shape_vec((labels.len(), rnn_window_size, encoding_size), data)
        .expect("each kept sub-sequence should contribute rnn_window_size encodings");
    Subsequences {
        windows,
        labels,
        positive_count,
        negative_count,
    }
}

/// Aggregates a sub-sequence of encodings into an outcome logit.
#[derive(Debug, Clone)]
pub struct StatePredictor {
    rnn: LSTM,
    classifier: Linear,
}

impl StatePredictor {
    pub fn new(encoding_size: usize, hidden_size: usize, vb: &VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            rnn: candle_nn::lstm(encoding_size, hidden_size, LSTMConfig::default(), vb.pp("rnn"))?,
            classifier: candle_nn::linear(hidden_size, 1, vb.pp("classifier"))?,
        })
    }

    /// Logits of `[count, rnn_window_size, encoding_size]` sub-sequences, shape `[count]`.
    pub fn forward(&self, windows: &Tensor) -> candle_core::Result<Tensor> {
        let last = last_hidden(&self.rnn, windows)?;
        self.classifier.forward(&last)?.squeeze(candle_core::D::Minus1)
    }
}

/// Loss and predictions of one pass over a split.
#[derive(Debug, Clone, Default)]
struct SplitOutcome {
    loss: f64,
    labels: Vec<bool>,
    scores: Vec<f64>,
}

impl SplitOutcome {
    fn auroc(&self) -> Option<f64> {
        roc_auc(&self.labels, &self.scores)
    }

    fn auprc(&self) -> Option<f64> {
        pr_auc(&self.labels, &self.scores)
    }

    fn report(&self, pos_sample_name: &str) -> ClassificationReport {
        ClassificationReport::new(&self.labels, &self.scores, 0.5, ["normal", pos_sample_name])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierScores {
    pub validation_auroc: Option<f64>,
    pub validation_auprc: Option<f64>,
    pub test_auroc: Option<f64>,
    pub test_auprc: Option<f64>,
}

/// Record stored with every classifier checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRecord {
    pub unique_id: String,
    pub encoder_fold: usize,
    pub fold: usize,
    pub scores: ClassifierScores,
}

#[derive(Debug, Clone)]
pub struct ClassificationSummary {
    pub scores: Vec<ClassifierScores>,
    pub validation_auroc: Option<MeanStd>,
    pub validation_auprc: Option<MeanStd>,
    pub test_auroc: Option<MeanStd>,
    pub test_auprc: Option<MeanStd>,
}

impl ClassificationSummary {
    fn new(scores: Vec<ClassifierScores>) -> Self {
        let summarize = |f: fn(&ClassifierScores) -> Option<f64>| MeanStd::new(scores.iter().filter_map(f));
        Self {
            validation_auroc: summarize(|s| s.validation_auroc),
            validation_auprc: summarize(|s| s.validation_auprc),
            test_auroc: summarize(|s| s.test_auroc),
            test_auprc: summarize(|s| s.test_auprc),
            scores,
        }
    }
}

/// One forward pass over `samples`, updating the predictor when `optimizer` is given.
///
/// Samples are batched by `config.batch_size`; each batch draws its own
/// `rnn_window_size`. The class weight only applies while training.
#[expect(clippy::cast_precision_loss)]
fn run_split<R>(
    predictor: &StatePredictor,
    samples: &[&EncodedSample],
    mut optimizer: Option<&mut AdamW>,
    config: &ClassificationConfig,
    rng: &mut R,
    device: &Device,
) -> Result<SplitOutcome, TrainError>
where
    R: Rng + ?Sized,
{
    let mut order = samples.to_vec();
    if optimizer.is_some() {
        order.shuffle(rng);
    }
    let mut outcome = SplitOutcome::default();
    let mut batches = 0_usize;
    for batch in order.chunks(config.batch_size) {
        let rnn_window_size = rng.random_range(1..=config.max_rnn_window_size);
        let subsequences =
            build_subsequences(batch, rnn_window_size, config.num_pre_positive_encodings);
        if subsequences.labels.is_empty() {
            continue;
        }
        let windows = to_tensor(&subsequences.windows, device)?;
        let targets = Tensor::new(subsequences.labels.as_slice(), device)?;
        let logits = predictor.forward(&windows)?;
        let pos_weight = optimizer.is_some().then(|| subsequences.pos_weight());
        let loss = loss::bce_with_logits(&logits, &targets, pos_weight)?;
        if let Some(optimizer) = optimizer.as_deref_mut() {
            optimizer.backward_step(&loss)?;
        }

        outcome.loss += f64::from(loss.to_scalar::<f32>()?);
        batches += 1;
        let scores = candle_nn::ops::sigmoid(&logits)?.to_vec1::<f32>()?;
        outcome.scores.extend(scores.into_iter().map(f64::from));
        outcome.labels.extend(subsequences.labels.iter().map(|l| *l > 0.5));
    }
    outcome.loss /= batches.max(1) as f64;
    Ok(outcome)
}

/// Trains a classifier on `train` and scores it on `validation` and `test`.
///
/// Checkpoints `{epoch, rnn, classifier}` as `name` every 10 epochs and after the
/// last one.
#[expect(clippy::too_many_arguments)]
pub fn train_classifier(
    train: &[&EncodedSample],
    validation: &[&EncodedSample],
    test: &[&EncodedSample],
    encoding_size: usize,
    run: &RunContext,
    (encoder_fold, fold): (usize, usize),
    rng: &mut Pcg64Mcg,
    device: &Device,
) -> Result<ClassifierScores, TrainError> {
    let config = &run.config().classification;
    if config.batch_size == 0 || config.max_rnn_window_size == 0 {
        return Err(TrainError::invalid_config(
            "batch_size and max_rnn_window_size must be positive",
        ));
    }
    let store = run.checkpoints();
    let name = run.classifier_checkpoint_name(encoder_fold, fold);

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let predictor = StatePredictor::new(encoding_size, config.hidden_size, &vb)?;
    let params = ParamsAdamW {
        lr: config.lr,
        weight_decay: config.decay,
        ..Default::default()
    };
    let mut optimizer = AdamW::new(varmap.all_vars(), params)?;

    let mut scores = ClassifierScores {
        validation_auroc: None,
        validation_auprc: None,
        test_auroc: None,
        test_auprc: None,
    };
    for epoch in 0..config.n_epochs {
        let train_outcome = run_split(&predictor, train, Some(&mut optimizer), config, rng, device)?;
        let validation_outcome = run_split(&predictor, validation, None, config, rng, device)?;
        let test_outcome = run_split(&predictor, test, None, config, rng, device)?;
        scores = ClassifierScores {
            validation_auroc: validation_outcome.auroc(),
            validation_auprc: validation_outcome.auprc(),
            test_auroc: test_outcome.auroc(),
            test_auprc: test_outcome.auprc(),
        };

        if epoch % CHECKPOINT_INTERVAL == 0 || epoch + 1 == config.n_epochs {
            tracing::info!(
                encoder_fold,
                fold,
                epoch,
                train_loss = train_outcome.loss,
                train_auroc = ?train_outcome.auroc(),
                train_auprc = ?train_outcome.auprc(),
                validation_loss = validation_outcome.loss,
                validation_auroc = ?scores.validation_auroc,
                validation_auprc = ?scores.validation_auprc,
                test_loss = test_outcome.loss,
                test_auroc = ?scores.test_auroc,
                test_auprc = ?scores.test_auprc,
                "classifier epoch finished"
            );
            for (split, outcome) in [
                ("train", &train_outcome),
                ("validation", &validation_outcome),
                ("test", &test_outcome),
            ] {
                let report = outcome.report(&config.pos_sample_name);
                tracing::info!("{split} classification report:\n{report}");
            }
            let record = ClassifierRecord {
                unique_id: run.unique_id().to_owned(),
                encoder_fold,
                fold,
                scores,
            };
            store.save(&name, epoch, &record, &varmap)?;
        }
    }
    Ok(scores)
}

/// Encodes every sample of `cohort` with `encoder`.
pub fn encode_cohort<E>(
    encoder: &E,
    cohort: &Cohort,
    sliding_gap: usize,
    device: &Device,
) -> Result<Vec<EncodedSample>, TrainError>
where
    E: Encoder + ?Sized,
{
    let outcomes = cohort
        .outcomes()
        .ok_or_else(|| TrainError::invalid_config("classification requires labelled samples"))?;
    cohort
        .samples()
        .iter()
        .zip(outcomes)
        .map(|(sample, positive)| {
            let sequence = encoder::encode_sequence(encoder, sample, sliding_gap, device)?;
            Ok(EncodedSample {
                encodings: sequence.encodings,
                validity: sequence.validity,
                positive,
            })
        })
        .collect()
}

/// Trains classifiers on every encoder fold's checkpoint and summarizes them.
///
/// For each encoder fold, `n_cross_val_classification` classifiers are trained on
/// reshuffled train/validation splits of `cohort` and scored on `test`. Encoder
/// folds without a checkpoint are skipped, and so are classifier folds whose
/// checkpoint already exists.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn run_classification(
    cohort: &Cohort,
    test: &Cohort,
    run: &RunContext,
    device: &Device,
) -> Result<ClassificationSummary, TrainError> {
    let config = &run.config().classification;
    if config.sliding_gap == 0 {
        return Err(TrainError::invalid_config("sliding_gap must be positive"));
    }
    let store = run.checkpoints();
    let mut scores = Vec::new();

    for encoder_fold in 0..run.config().learn_encoder.n_cross_val_encoder {
        let name = run.encoder_checkpoint_name(encoder_fold);
        let Some((checkpoint, tensors)) = store.load_tensors::<EncoderRecord>(&name, device)? else {
            tracing::warn!(encoder_fold, %name, "no encoder checkpoint; skipping fold");
            continue;
        };
        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
        let record = checkpoint.record;
        let encoder = record.config.encoder.build(record.input, vb.pp("encoder"))?;
        tracing::info!(encoder_fold, epoch = checkpoint.epoch, "encoding cohorts");
        let encoded = encode_cohort(&encoder, cohort, config.sliding_gap, device)?;
        let encoded_test = encode_cohort(&encoder, test, config.sliding_gap, device)?;
        let test_refs = encoded_test.iter().collect::<Vec<_>>();

        for fold in 0..config.n_cross_val_classification {
            let checkpoint_name = run.classifier_checkpoint_name(encoder_fold, fold);
            if store.exists(&checkpoint_name) {
                tracing::info!(encoder_fold, fold, "classifier checkpoint exists; skipping");
                continue;
            }
            let mut rng = Pcg64Mcg::seed_from_u64(
                config
                    .seed
                    .wrapping_add(FOLD_SEED_STRIDE.wrapping_mul(fold as u64)),
            );
            let mut shuffled = encoded.iter().collect::<Vec<_>>();
            shuffled.shuffle(&mut rng);
            let n_validation = (shuffled.len() as f64 * config.validation_fraction) as usize;
            let (validation, train) = shuffled.split_at(n_validation.min(shuffled.len()));

            let fold_scores = train_classifier(
                train,
                validation,
                &test_refs,
                encoder.encoding_size(),
                run,
                (encoder_fold, fold),
                &mut rng,
                device,
            )?;
            scores.push(fold_scores);
        }
    }

    let summary = ClassificationSummary::new(scores);
    if let (Some(auroc), Some(auprc)) = (summary.validation_auroc, summary.validation_auprc) {
        tracing::info!("Validation AUC: {auroc:.4}, AUPRC: {auprc:.4}");
    }
    if let (Some(auroc), Some(auprc)) = (summary.test_auroc, summary.test_auprc) {
        tracing::info!("Test AUC: {auroc:.4}, AUPRC: {auprc:.4}");
    }
    Ok(summary)
}
