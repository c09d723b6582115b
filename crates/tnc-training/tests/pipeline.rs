use candle_core::Device;
use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;
use tnc_neighborhood::PolicyFlags;
use tnc_series::synthetic::{self, SimulationConfig};
use tnc_training::{
    EncoderConfig, RunConfig, RunContext,
    checkpoint::{Checkpoint, CheckpointStore},
    classifier::{self, ClassificationConfig},
    contrastive::{self, EncoderRecord, LearnEncoderConfig},
};

fn run_config(dir: &std::path::Path, n_epochs: usize, cont: bool) -> RunConfig {
    RunConfig {
        data_type: "simulation".into(),
        checkpoint_dir: dir.to_path_buf(),
        encoder: EncoderConfig::Mlp {
            hidden_size: 8,
            encoding_size: 3,
        },
        learn_encoder: LearnEncoderConfig {
            window_size: 10,
            batch_size: 4,
            mc_sample_size: 3,
            n_epochs,
            cont,
            num_workers: Some(2),
            policy: PolicyFlags {
                adf: false,
                eta: Some(1),
                ..PolicyFlags::default()
            },
            ..LearnEncoderConfig::default()
        },
        classification: ClassificationConfig {
            n_cross_val_classification: 1,
            n_epochs: 2,
            batch_size: 4,
            sliding_gap: 10,
            num_pre_positive_encodings: 4,
            ..ClassificationConfig::default()
        },
    }
}

fn cohort(seed: u64) -> tnc_series::Cohort {
    let config = SimulationConfig {
        num_samples: 10,
        num_features: 2,
        len: 120,
        ..SimulationConfig::default()
    };
    synthetic::simulate(&config, &mut Pcg64Mcg::seed_from_u64(seed)).unwrap()
}

#[test]
fn test_encoder_training_resume_and_classification() {
    let dir = tempfile::tempdir().unwrap();
    let device = Device::Cpu;
    let train = cohort(1);

    let run = RunContext::new(run_config(dir.path(), 2, false), Some("first".into())).unwrap();
    let report = contrastive::learn_encoder(&train, &run, &device).unwrap();
    assert_eq!(report.folds.len(), 1);
    assert!(report.loss.unwrap().mean.is_finite());
    assert!((0.0..=1.0).contains(&report.accuracy.unwrap().mean));
    // 10 samples, 8 for training: every anchor uses the fixed half-width
    assert_eq!(report.stats.half_widths.keys().copied().collect::<Vec<_>>(), [30]);

    let store = CheckpointStore::new(dir.path().join("simulation"));
    let name = run.encoder_checkpoint_name(0);
    let mut varmap = candle_nn::VarMap::new();
    let checkpoint: Option<Checkpoint<EncoderRecord>> = {
        // an empty varmap loads only the manifest
        store.load(&name, &mut varmap).unwrap()
    };
    let checkpoint = checkpoint.unwrap();
    assert_eq!(checkpoint.epoch, 1);
    assert_eq!(checkpoint.record.performance.len(), 2);
    assert_eq!(checkpoint.record.config.learn_encoder.window_size, 10);

    let resumed = RunContext::new(run_config(dir.path(), 3, true), Some("second".into())).unwrap();
    contrastive::learn_encoder(&train, &resumed, &device).unwrap();
    let checkpoint: Checkpoint<EncoderRecord> = store.load(&name, &mut varmap).unwrap().unwrap();
    assert_eq!(checkpoint.epoch, 2);
    assert_eq!(
        checkpoint
            .record
            .performance
            .iter()
            .map(|r| r.epoch)
            .collect::<Vec<_>>(),
        [0, 1, 2]
    );

    let test = cohort(2);
    let summary = classifier::run_classification(&train, &test, &resumed, &device).unwrap();
    assert_eq!(summary.scores.len(), 1);
    assert!(store.exists(&resumed.classifier_checkpoint_name(0, 0)));

    // a second pass finds the classifier checkpoint and trains nothing
    let summary = classifier::run_classification(&train, &test, &resumed, &device).unwrap();
    assert!(summary.scores.is_empty());
}
