use crate::data::{collate, BatchLoader};
use crate::error::{Error, Result};
use crate::model::architecture::FactorizedMlp;
use crate::model::loss::RegressionMetrics;
use burn::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Evaluation summary over one pass of a dataset
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationSummary {
    /// Dataset tag
    pub dataset: String,
    /// Model tag
    pub model: String,
    /// Number of examples evaluated
    pub num_examples: usize,
    /// Number of batches
    pub num_batches: usize,
    /// Mean squared error (log scale)
    pub mse: f64,
    /// Root mean squared error (log scale)
    pub rmse: f64,
    /// Mean absolute error (log scale)
    pub mae: f64,
    /// Wall time in seconds
    pub duration_secs: f64,
}

impl EvaluationSummary {
    /// Log the summary
    pub fn log(&self) {
        info!("=== Evaluation Summary ===");
        info!("Dataset: {}, model: {}", self.dataset, self.model);
        info!("Examples: {} in {} batches", self.num_examples, self.num_batches);
        info!("MSE: {:.6}", self.mse);
        info!("RMSE: {:.6}", self.rmse);
        info!("MAE: {:.6}", self.mae);
        info!("Time: {}", crate::utils::format_duration(self.duration_secs));
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Run `model` over every batch of `loader` and accumulate regression metrics
pub fn evaluate<B: Backend>(
    model: &FactorizedMlp<B>,
    loader: &BatchLoader,
    device: &B::Device,
    show_progress: bool,
) -> Result<EvaluationSummary> {
    let start = Instant::now();
    let num_batches = loader.num_batches();

    let progress = if show_progress {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        ProgressBar::new(num_batches as u64).with_style(style)
    } else {
        ProgressBar::hidden()
    };

    let mut metrics = RegressionMetrics::default();
    for examples in loader.batches(0) {
        let batch = collate::<B>(&examples?, device)?;
        let predictions = model.forward(batch.features)?;
        metrics.update(predictions, batch.targets);
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(EvaluationSummary {
        dataset: loader.dataset().kind().to_string(),
        model: model.kind().to_string(),
        num_examples: metrics.count,
        num_batches,
        mse: metrics.mse(),
        rmse: metrics.rmse(),
        mae: metrics.mae(),
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

/// Learned embedding tables with the dataset's extra info
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingExport {
    /// One row per entity-a id
    pub entity_a: Vec<Vec<f32>>,
    /// One row per entity-b id
    pub entity_b: Vec<Vec<f32>>,
    /// Per-entity metadata (e.g. tissue type per patient)
    pub extra_info: BTreeMap<String, Vec<i64>>,
}

impl EmbeddingExport {
    pub fn from_model<B: Backend>(
        model: &FactorizedMlp<B>,
        extra_info: BTreeMap<String, Vec<i64>>,
    ) -> Result<Self> {
        let embeddings = model.embeddings();
        Ok(Self {
            entity_a: table_rows(embeddings.entity_a.weight.val())?,
            entity_b: table_rows(embeddings.entity_b.weight.val())?,
            extra_info,
        })
    }
}

fn table_rows<B: Backend>(weight: Tensor<B, 2>) -> Result<Vec<Vec<f32>>> {
    let [_, emb_size] = weight.dims();
    let values = weight
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::TensorData(format!("{:?}", e)))?;

    Ok(values.chunks(emb_size).map(|row| row.to_vec()).collect())
}

/// Write both embedding tables and `extra_info` as JSON
pub fn export_embeddings<B: Backend, P: AsRef<Path>>(
    model: &FactorizedMlp<B>,
    extra_info: BTreeMap<String, Vec<i64>>,
    path: P,
) -> Result<EmbeddingExport> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        crate::utils::ensure_dir(parent)?;
    }

    let export = EmbeddingExport::from_model(model, extra_info)?;
    fs::write(path, serde_json::to_string_pretty(&export)?)?;

    info!(
        "Exported {} + {} embeddings to {:?}",
        export.entity_a.len(),
        export.entity_b.len(),
        path
    );
    Ok(export)
}
