use burn::prelude::*;
use burn::record::{CompactRecorder, Recorder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::architecture::FactorizedMlp;
use crate::model::ModelConfig;

/// Metadata stored next to the weights; enough to rebuild the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Crate version that wrote the checkpoint
    pub version: String,
    /// Model configuration
    pub model_config: ModelConfig,
    /// Training epoch, if written by a training loop
    pub epoch: Option<usize>,
    /// Seconds since the Unix epoch
    pub created_at: u64,
}

impl CheckpointMetadata {
    pub fn new(model_config: ModelConfig) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            version: crate::VERSION.to_string(),
            model_config,
            epoch: None,
            created_at,
        }
    }

    pub fn with_epoch(mut self, epoch: usize) -> Self {
        self.epoch = Some(epoch);
        self
    }
}

/// Saves and loads model weights (`.mpk`) with JSON metadata (`.json`)
pub struct CheckpointManager {
    checkpoint_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P) -> Result<Self> {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();
        crate::utils::ensure_dir(&checkpoint_dir)?;
        Ok(Self { checkpoint_dir })
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Save `model` under `name` (e.g. "model" -> model.mpk + model.json)
    pub fn save<B: Backend>(
        &self,
        model: &FactorizedMlp<B>,
        metadata: &CheckpointMetadata,
        name: &str,
    ) -> Result<PathBuf> {
        let checkpoint_path = self.checkpoint_dir.join(format!("{}.mpk", name));
        save_model(model, metadata, &checkpoint_path)?;
        Ok(checkpoint_path)
    }

    /// Load the checkpoint saved under `name`
    pub fn load<B: Backend>(
        &self,
        name: &str,
        device: &B::Device,
    ) -> Result<(FactorizedMlp<B>, CheckpointMetadata)> {
        load_model(self.checkpoint_dir.join(format!("{}.mpk", name)), device)
    }
}

/// Write the weights of `model` to `path` and its metadata next to it
pub fn save_model<B: Backend, P: AsRef<Path>>(
    model: &FactorizedMlp<B>,
    metadata: &CheckpointMetadata,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        crate::utils::ensure_dir(parent)?;
    }

    CompactRecorder::new()
        .record(model.clone().into_record(), path.to_path_buf())
        .map_err(|e| Error::Checkpoint(format!("Failed to save {:?}: {:?}", path, e)))?;

    let metadata_json = serde_json::to_string_pretty(metadata)?;
    fs::write(metadata_path(path), metadata_json)?;

    info!("Saved checkpoint: {:?}", path);
    Ok(())
}

/// Rebuild the model described by the metadata and load its weights
pub fn load_model<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> Result<(FactorizedMlp<B>, CheckpointMetadata)> {
    let path = path.as_ref();
    info!("Loading checkpoint from {:?}", path);

    let metadata_file = metadata_path(path);
    if !metadata_file.is_file() {
        return Err(Error::FileNotFound(metadata_file));
    }
    let metadata: CheckpointMetadata = serde_json::from_str(&fs::read_to_string(&metadata_file)?)?;

    let record = CompactRecorder::new()
        .load(path.to_path_buf(), device)
        .map_err(|e| Error::Checkpoint(format!("Failed to load {:?}: {:?}", path, e)))?;

    let model = metadata.model_config.init::<B>(device)?.load_record(record);

    info!(
        "Loaded {} model (input size {:?})",
        metadata.model_config.kind, metadata.model_config.input_size
    );
    Ok((model, metadata))
}

fn metadata_path(path: &Path) -> PathBuf {
    path.with_extension("json")
}
