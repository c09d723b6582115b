use std::path::PathBuf;

use candle_core::Device;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tnc_neighborhood::{NeighborhoodPolicy, PolicyError};

use crate::{
    checkpoint::CheckpointStore, classifier::ClassificationConfig, contrastive::LearnEncoderConfig,
    encoder::EncoderConfig,
};

/// Everything a run is configured with, as read from the run configuration file.
///
/// The whole value is echoed into every encoder checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Name of the data set; checkpoints are grouped by it.
    pub data_type: String,
    pub checkpoint_dir: PathBuf,
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub learn_encoder: LearnEncoderConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
}

/// Immutable identity of one run, passed to every training entry point.
#[derive(Debug, Clone)]
pub struct RunContext {
    unique_id: String,
    unique_name: String,
    policy: NeighborhoodPolicy,
    config: RunConfig,
}

impl RunContext {
    /// Resolves the neighborhood policy and derives the run names.
    ///
    /// `unique_id` defaults to the current UTC time. The unique name does not include
    /// it, so a later run with the same data type, encoder, policy and window size
    /// finds (and may resume) this run's encoder checkpoints.
    pub fn new(config: RunConfig, unique_id: Option<String>) -> Result<Self, PolicyError> {
        let policy = config.learn_encoder.policy.resolve()?;
        let unique_id =
            unique_id.unwrap_or_else(|| Utc::now().format("%Y%m%dT%H%M%SZ").to_string());
        let unique_name = format!(
            "{}_{}_{}_ws{}",
            config.data_type,
            config.encoder.tag(),
            policy.tag(),
            config.learn_encoder.window_size
        );
        Ok(Self {
            unique_id,
            unique_name,
            policy,
            config,
        })
    }

    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    #[must_use]
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    #[must_use]
    pub fn policy(&self) -> NeighborhoodPolicy {
        self.policy
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Checkpoint store of this run's data type.
    #[must_use]
    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.config.checkpoint_dir.join(&self.config.data_type))
    }

    /// Name of the encoder checkpoint of fold `fold`.
    #[must_use]
    pub fn encoder_checkpoint_name(&self, fold: usize) -> String {
        format!("{}_checkpoint_{fold}", self.unique_name)
    }

    /// Name of the classifier checkpoint trained on encoder fold `encoder_fold`.
    #[must_use]
    pub fn classifier_checkpoint_name(&self, encoder_fold: usize, fold: usize) -> String {
        format!(
            "{}_{}_encoder_checkpoint_{encoder_fold}_classifier_checkpoint_{fold}",
            self.unique_id, self.unique_name
        )
    }
}

/// The first CUDA device if available, the CPU otherwise.
#[must_use]
pub fn select_device() -> Device {
    match Device::cuda_if_available(0) {
        Ok(device) => device,
        Err(e) => {
            tracing::warn!("falling back to CPU: {e}");
            Device::Cpu
        }
    }
}

#[cfg(test)]
mod tests {
    use tnc_neighborhood::PolicyFlags;

    use super::*;

    fn config() -> RunConfig {
        RunConfig {
            data_type: "simulation".into(),
            checkpoint_dir: PathBuf::from("ckpt"),
            encoder: EncoderConfig::Rnn {
                hidden_size: 16,
                encoding_size: 4,
            },
            learn_encoder: LearnEncoderConfig {
                window_size: 20,
                policy: PolicyFlags {
                    adf: false,
                    eta: Some(2),
                    ..PolicyFlags::default()
                },
                ..LearnEncoderConfig::default()
            },
            classification: ClassificationConfig::default(),
        }
    }

    #[test]
    fn test_names() {
        let run = RunContext::new(config(), Some("run1".into())).unwrap();
        assert_eq!(run.unique_name(), "simulation_rnn_eta2_ws20");
        assert_eq!(run.encoder_checkpoint_name(1), "simulation_rnn_eta2_ws20_checkpoint_1");
        assert_eq!(
            run.classifier_checkpoint_name(0, 2),
            "run1_simulation_rnn_eta2_ws20_encoder_checkpoint_0_classifier_checkpoint_2"
        );
        assert_eq!(run.checkpoints().dir(), PathBuf::from("ckpt/simulation"));
    }

    #[test]
    fn test_default_id_is_timestamp() {
        let run = RunContext::new(config(), None).unwrap();
        assert_eq!(run.unique_id().len(), "20260101T000000Z".len());
        assert!(run.unique_id().ends_with('Z'));
    }

    #[test]
    fn test_conflicting_policy_is_rejected() {
        let mut config = config();
        config.learn_encoder.policy = PolicyFlags {
            adf: true,
            acf: true,
            ..PolicyFlags::default()
        };
        assert_eq!(
            RunContext::new(config, None).unwrap_err(),
            PolicyError::Conflicting
        );
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "data_type": "simulation",
            "checkpoint_dir": "ckpt",
            "encoder": { "kind": "cnn", "channels": 8, "kernel_size": 3, "encoding_size": 6 },
            "learn_encoder": { "window_size": 10, "acf_plus": true, "adf": false }
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.encoder.encoding_size(), 6);
        assert_eq!(config.learn_encoder.window_size, 10);
        let run = RunContext::new(config, Some("x".into())).unwrap();
        assert!(run.policy().is_acf_plus());
    }
}
