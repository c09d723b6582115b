//! Contrastive encoder training.
//!
//! [`learn_encoder`] trains one encoder per cross-validation fold. Each fold:
//!
//! 1. reseeds its RNG with `seed + 21·fold`, shuffles the cohort and keeps the first
//!    80% for training and the rest for validation;
//! 2. resumes from the fold's checkpoint when `cont` is set and one exists;
//! 3. runs [`epoch_run`] on both splits every epoch, checkpointing every 10 epochs and
//!    after the last one;
//! 4. reports the validation accuracy and loss of the epoch with the lowest
//!    validation loss.

use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW, VarBuilder, VarMap};
use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use tnc_neighborhood::{DataLoader, DatasetConfig, PolicyFlags, SamplingStats, TncDataset};
use tnc_series::Cohort;
use tnc_stats::summary::MeanStd;

use crate::{
    BatchTensors, ContrastiveObjective, Discriminator, Encoder as _, EncoderConfig, InputShape,
    RunConfig, RunContext, TrainError, WindowEncoder, loss,
};

/// Epochs between checkpoints and progress logs.
pub const CHECKPOINT_INTERVAL: usize = 10;
/// Fraction of each fold's cohort used for training.
pub const TRAIN_FRACTION: f64 = 0.8;
/// Seed stride between folds.
const FOLD_SEED_STRIDE: u64 = 21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnEncoderConfig {
    pub window_size: usize,
    /// Debiasing weight: fraction of negatives scored as unlabeled.
    pub w: f64,
    pub batch_size: usize,
    pub lr: f64,
    pub decay: f64,
    /// Positives and negatives drawn per anchor.
    pub mc_sample_size: usize,
    pub n_epochs: usize,
    pub n_cross_val_encoder: usize,
    /// Resume folds from existing checkpoints.
    pub cont: bool,
    pub seed: u64,
    /// Sampling threads; all available cores if unset.
    pub num_workers: Option<usize>,
    #[serde(flatten)]
    pub policy: PolicyFlags,
}

impl Default for LearnEncoderConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            w: 0.05,
            batch_size: 10,
            lr: 1e-3,
            decay: 1e-5,
            mc_sample_size: 20,
            n_epochs: 150,
            n_cross_val_encoder: 1,
            cont: false,
            seed: 0,
            num_workers: None,
            policy: PolicyFlags::default(),
        }
    }
}

/// Mean loss and accuracy over the batches of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train: EpochMetrics,
    pub validation: EpochMetrics,
}

/// Record stored with every encoder checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderRecord {
    pub unique_id: String,
    pub unique_name: String,
    pub fold: usize,
    pub input: InputShape,
    pub config: RunConfig,
    pub performance: Vec<EpochRecord>,
}

/// Best validation performance of one fold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldOutcome {
    pub fold: usize,
    /// Epoch with the lowest validation loss.
    pub best_epoch: usize,
    pub accuracy: f64,
    pub loss: f64,
}

#[derive(Debug, Clone)]
pub struct EncoderReport {
    pub folds: Vec<FoldOutcome>,
    pub accuracy: Option<MeanStd>,
    pub loss: Option<MeanStd>,
    pub stats: SamplingStats,
}

/// An encoder and the discriminator trained with it.
#[derive(Debug, Clone)]
pub struct ContrastiveModel {
    encoder: WindowEncoder,
    discriminator: Discriminator,
}

impl ContrastiveModel {
    /// Builds the encoder under `encoder.` and the discriminator under `discriminator.`.
    pub fn new(
        config: &EncoderConfig,
        input: InputShape,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        Ok(Self {
            encoder: config.build(input, vb.pp("encoder"))?,
            discriminator: Discriminator::new(config.encoding_size(), vb.pp("discriminator"))?,
        })
    }

    #[must_use]
    pub fn encoder(&self) -> &WindowEncoder {
        &self.encoder
    }

    /// Loss tensor and accuracy of one batch.
    pub fn step(
        &self,
        batch: &BatchTensors,
        objective: ContrastiveObjective,
        train: bool,
    ) -> candle_core::Result<(Tensor, f64)> {
        let z_t = self.encoder.encode(&batch.anchors)?;
        let z_p = self.encoder.encode(&batch.positives)?;
        let z_n = self.encoder.encode(&batch.negatives)?;
        let d_p = self.discriminator.forward(&z_t, &z_p, train)?;
        let d_n = self.discriminator.forward(&z_t, &z_n, train)?;
        let loss = objective.loss(&d_p, &d_n)?;
        let accuracy = loss::discrimination_accuracy(&d_p, &d_n)?;
        Ok((loss, accuracy))
    }
}

/// Runs one epoch over `loader`, updating the model when `optimizer` is given.
///
/// Returns the loss and accuracy averaged over batches, and the sampling statistics
/// of the epoch.
#[expect(clippy::cast_precision_loss)]
pub fn epoch_run<R>(
    model: &ContrastiveModel,
    loader: &DataLoader<'_>,
    rng: &mut R,
    objective: ContrastiveObjective,
    mut optimizer: Option<&mut AdamW>,
    device: &Device,
) -> Result<(EpochMetrics, SamplingStats), TrainError>
where
    R: Rng + ?Sized,
{
    let train = optimizer.is_some();
    let mut stats = SamplingStats::default();
    let (mut total_loss, mut total_accuracy, mut batches) = (0.0, 0.0, 0_usize);
    for batch in loader.epoch(rng) {
        let batch = batch?;
        stats.merge(&batch.stats);
        let tensors = BatchTensors::new(&batch, device)?;
        let (loss, accuracy) = model.step(&tensors, objective, train)?;
        if let Some(optimizer) = optimizer.as_deref_mut() {
            optimizer.backward_step(&loss)?;
        }
        total_loss += f64::from(loss.to_scalar::<f32>()?);
        total_accuracy += accuracy;
        batches += 1;
    }
    let n = batches.max(1) as f64;
    let metrics = EpochMetrics {
        loss: total_loss / n,
        accuracy: total_accuracy / n,
    };
    Ok((metrics, stats))
}

/// Trains an encoder per cross-validation fold and summarizes the folds.
pub fn learn_encoder(
    cohort: &Cohort,
    run: &RunContext,
    device: &Device,
) -> Result<EncoderReport, TrainError> {
    let config = &run.config().learn_encoder;
    if config.n_cross_val_encoder == 0 || config.batch_size == 0 {
        return Err(TrainError::invalid_config(
            "n_cross_val_encoder and batch_size must be positive",
        ));
    }
    let input = InputShape::of(cohort, config.window_size);
    let objective = ContrastiveObjective::new(&run.policy(), config.w);
    tracing::info!(
        name = run.unique_name(),
        policy = ?run.policy(),
        ?objective,
        samples = cohort.len(),
        "training encoder"
    );

    let mut folds = Vec::new();
    let mut stats = SamplingStats::default();
    for fold in 0..config.n_cross_val_encoder {
        let (outcome, fold_stats) = learn_fold(cohort, run, fold, input, objective, device)?;
        stats.merge(&fold_stats);
        folds.extend(outcome);
    }

    tracing::info!("sampling statistics: {stats}");
    let accuracy = MeanStd::new(folds.iter().map(|f| f.accuracy));
    let loss = MeanStd::new(folds.iter().map(|f| f.loss));
    if let (Some(accuracy), Some(loss)) = (accuracy, loss) {
        tracing::info!("Accuracy: {:.2}", accuracy.scaled(100.0));
        tracing::info!("Loss: {loss:.4}");
    }
    Ok(EncoderReport {
        folds,
        accuracy,
        loss,
        stats,
    })
}

fn learn_fold(
    cohort: &Cohort,
    run: &RunContext,
    fold: usize,
    input: InputShape,
    objective: ContrastiveObjective,
    device: &Device,
) -> Result<(Option<FoldOutcome>, SamplingStats), TrainError> {
    let config = &run.config().learn_encoder;
    let store = run.checkpoints();
    let name = run.encoder_checkpoint_name(fold);
    let mut rng = Pcg64Mcg::seed_from_u64(
        config
            .seed
            .wrapping_add(FOLD_SEED_STRIDE.wrapping_mul(fold as u64)),
    );

    let mut varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let model = ContrastiveModel::new(&run.config().encoder, input, &vb)?;

    let mut performance = Vec::new();
    let mut epoch_start = 0;
    if config.cont {
        match store.load::<EncoderRecord>(&name, &mut varmap)? {
            Some(checkpoint) => {
                tracing::info!(fold, epoch = checkpoint.epoch, "resuming from checkpoint");
                epoch_start = checkpoint.epoch + 1;
                performance = checkpoint.record.performance;
            }
            None => tracing::info!(fold, "no checkpoint found; starting fresh"),
        }
    }
    let params = ParamsAdamW {
        lr: config.lr,
        weight_decay: config.decay,
        ..Default::default()
    };
    let mut optimizer = AdamW::new(varmap.all_vars(), params)?;

    let (train, validation) = cohort.shuffled(&mut rng).split_fraction(TRAIN_FRACTION);
    if train.is_empty() || validation.is_empty() {
        return Err(TrainError::invalid_config(format!(
            "a cohort of {} samples leaves an empty train or validation split",
            cohort.len()
        )));
    }
    let dataset_config = DatasetConfig {
        window_size: config.window_size,
        mc_sample_size: config.mc_sample_size,
        policy: run.policy(),
    };
    let train_set = TncDataset::new(train, dataset_config)?;
    let validation_set = TncDataset::new(validation, dataset_config)?;
    let mut train_loader = DataLoader::new(&train_set, config.batch_size);
    let mut validation_loader = DataLoader::new(&validation_set, config.batch_size).with_shuffle(false);
    if let Some(workers) = config.num_workers {
        train_loader = train_loader.with_workers(workers);
        validation_loader = validation_loader.with_workers(workers);
    }

    let mut stats = SamplingStats::default();
    for epoch in epoch_start..config.n_epochs {
        let (train_metrics, train_stats) =
            epoch_run(&model, &train_loader, &mut rng, objective, Some(&mut optimizer), device)?;
        let (validation_metrics, validation_stats) =
            epoch_run(&model, &validation_loader, &mut rng, objective, None, device)?;
        stats.merge(&train_stats);
        stats.merge(&validation_stats);
        performance.push(EpochRecord {
            epoch,
            train: train_metrics,
            validation: validation_metrics,
        });

        if epoch % CHECKPOINT_INTERVAL == 0 || epoch + 1 == config.n_epochs {
            tracing::info!(
                fold,
                epoch,
                train_loss = train_metrics.loss,
                train_accuracy = train_metrics.accuracy,
                validation_loss = validation_metrics.loss,
                validation_accuracy = validation_metrics.accuracy,
                "epoch finished"
            );
            let record = EncoderRecord {
                unique_id: run.unique_id().to_owned(),
                unique_name: run.unique_name().to_owned(),
                fold,
                input,
                config: run.config().clone(),
                performance: performance.clone(),
            };
            store.save(&name, epoch, &record, &varmap)?;
        }
    }

    let outcome = performance
        .iter()
        .min_by(|a, b| a.validation.loss.total_cmp(&b.validation.loss))
        .map(|best| FoldOutcome {
            fold,
            best_epoch: best.epoch,
            accuracy: best.validation.accuracy,
            loss: best.validation.loss,
        });
    if let Some(outcome) = &outcome {
        tracing::info!(
            fold,
            best_epoch = outcome.best_epoch,
            accuracy = outcome.accuracy,
            loss = outcome.loss,
            "fold finished"
        );
    }
    Ok((outcome, stats))
}
