//! Checkpoint storage.
//!
//! A checkpoint is a JSON manifest `<name>.json` plus the safetensors file it points
//! to. Weights are written under a fresh file name per epoch and the manifest is
//! replaced atomically (write to a temporary file, then rename), so an interrupted
//! save leaves the previous checkpoint loadable.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Debug, Display, Error)]
pub enum CheckpointError {
    #[display("I/O error on {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("malformed checkpoint manifest {}", path.display())]
    Manifest {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("failed to transfer weights of {}", path.display())]
    Weights {
        path: PathBuf,
        source: candle_core::Error,
    },
}

/// A manifest: the epoch it was taken at, its weights file and a caller record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<R> {
    pub epoch: usize,
    /// File name of the weights, relative to the store directory.
    pub weights: String,
    pub record: R,
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Returns whether a checkpoint named `name` exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.manifest_path(name).is_file()
    }

    /// Saves the variables of `varmap` with `record` as checkpoint `name`.
    ///
    /// Replaces an earlier checkpoint of the same name and removes its weights.
    pub fn save<R>(
        &self,
        name: &str,
        epoch: usize,
        record: &R,
        varmap: &VarMap,
    ) -> Result<(), CheckpointError>
    where
        R: Serialize + DeserializeOwned,
    {
        fs::create_dir_all(&self.dir).map_err(|source| CheckpointError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let previous = self.read_manifest::<R>(name).ok().flatten();

        let weights = format!("{name}_epoch{epoch}.safetensors");
        let weights_path = self.dir.join(&weights);
        varmap
            .save(&weights_path)
            .map_err(|source| CheckpointError::Weights {
                path: weights_path.clone(),
                source,
            })?;

        let checkpoint = Checkpoint {
            epoch,
            weights,
            record,
        };
        let json = serde_json::to_string_pretty(&checkpoint).map_err(|source| {
            CheckpointError::Manifest {
                path: self.manifest_path(name),
                source,
            }
        })?;
        let path = self.manifest_path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| CheckpointError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| CheckpointError::Io {
            path: path.clone(),
            source,
        })?;

        if let Some(previous) = previous
            && previous.weights != checkpoint.weights
        {
            let stale = self.dir.join(&previous.weights);
            if let Err(e) = fs::remove_file(&stale) {
                tracing::warn!(path = %stale.display(), "failed to remove stale weights: {e}");
            }
        }
        tracing::debug!(path = %path.display(), epoch, "saved checkpoint");
        Ok(())
    }

    fn read_manifest<R>(&self, name: &str) -> Result<Option<Checkpoint<R>>, CheckpointError>
    where
        R: DeserializeOwned,
    {
        let path = self.manifest_path(name);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CheckpointError::Io { path, source }),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| CheckpointError::Manifest { path, source })
    }

    /// Loads checkpoint `name` into the matching variables of `varmap`.
    ///
    /// Returns `None` if there is no such checkpoint. Variables of `varmap` missing
    /// from the weights file are an error; extra tensors in the file are ignored.
    pub fn load<R>(
        &self,
        name: &str,
        varmap: &mut VarMap,
    ) -> Result<Option<Checkpoint<R>>, CheckpointError>
    where
        R: DeserializeOwned,
    {
        let Some(checkpoint) = self.read_manifest::<R>(name)? else {
            return Ok(None);
        };
        let path = self.dir.join(&checkpoint.weights);
        varmap
            .load(&path)
            .map_err(|source| CheckpointError::Weights { path, source })?;
        Ok(Some(checkpoint))
    }

    /// Loads checkpoint `name` as plain (untracked) tensors on `device`.
    pub fn load_tensors<R>(
        &self,
        name: &str,
        device: &Device,
    ) -> Result<Option<(Checkpoint<R>, HashMap<String, Tensor>)>, CheckpointError>
    where
        R: DeserializeOwned,
    {
        let Some(checkpoint) = self.read_manifest::<R>(name)? else {
            return Ok(None);
        };
        let path = self.dir.join(&checkpoint.weights);
        let tensors = candle_core::safetensors::load(&path, device)
            .map_err(|source| CheckpointError::Weights { path, source })?;
        Ok(Some((checkpoint, tensors)))
    }
}

#[cfg(test)]
mod tests {
    use candle_core::DType;
    use candle_nn::{Init, VarBuilder};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        note: String,
    }

    fn varmap_with(value: f64) -> VarMap {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        vb.pp("encoder")
            .get_with_hints((2, 3), "weight", Init::Const(value))
            .unwrap();
        varmap
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut varmap = varmap_with(0.0);
        assert!(!store.exists("nothing"));
        assert!(store.load::<Record>("nothing", &mut varmap).unwrap().is_none());
        assert!(
            store
                .load_tensors::<Record>("nothing", &Device::Cpu)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_roundtrip_restores_weights() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested"));
        let record = Record { note: "fold 0".into() };
        store.save("run_checkpoint_0", 10, &record, &varmap_with(2.5)).unwrap();
        assert!(store.exists("run_checkpoint_0"));

        let mut varmap = varmap_with(0.0);
        let checkpoint = store
            .load::<Record>("run_checkpoint_0", &mut varmap)
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.epoch, 10);
        assert_eq!(checkpoint.record, record);
        let weight = varmap.data().lock().unwrap()["encoder.weight"].as_tensor().clone();
        assert_eq!(weight.to_vec2::<f32>().unwrap(), vec![vec![2.5; 3]; 2]);

        let (_, tensors) = store
            .load_tensors::<Record>("run_checkpoint_0", &Device::Cpu)
            .unwrap()
            .unwrap();
        assert_eq!(tensors["encoder.weight"].dims(), &[2, 3]);
    }

    #[test]
    fn test_resave_replaces_weights() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let record = Record { note: String::new() };
        store.save("ckpt", 0, &record, &varmap_with(1.0)).unwrap();
        store.save("ckpt", 10, &record, &varmap_with(2.0)).unwrap();

        assert!(!dir.path().join("ckpt_epoch0.safetensors").exists());
        assert!(dir.path().join("ckpt_epoch10.safetensors").exists());
        assert!(!dir.path().join("ckpt.json.tmp").exists());
        let mut varmap = varmap_with(0.0);
        let checkpoint = store.load::<Record>("ckpt", &mut varmap).unwrap().unwrap();
        assert_eq!(checkpoint.epoch, 10);
    }

    #[test]
    fn test_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{").unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut varmap = varmap_with(0.0);
        assert!(matches!(
            store.load::<Record>("bad", &mut varmap),
            Err(CheckpointError::Manifest { .. })
        ));
    }
}
