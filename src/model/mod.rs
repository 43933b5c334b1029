pub mod architecture;
pub mod checkpoint;
pub mod embedding;
pub mod loss;

use crate::config::Options;
use crate::error::Error;
use architecture::FactorizedMlp;
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Model selected by the `model` option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// One embedding per entity id
    Factor,
    /// Entity-a is a sequence of ids whose embeddings are summed
    Bag,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Factor => "factor",
            ModelKind::Bag => "bag",
        }
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "factor" => Ok(ModelKind::Factor),
            "bag" => Ok(ModelKind::Bag),
            other => Err(Error::UnsupportedConfiguration(format!(
                "Unknown model {:?} (expected \"factor\" or \"bag\")",
                other
            ))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model configuration
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Vocabulary sizes of the entity-a and entity-b embedding tables
    pub input_size: [usize; 2],

    /// Hidden layer widths, in order
    pub layers_size: Vec<usize>,

    /// Embedding dimension of both tables
    #[config(default = "2")]
    pub emb_size: usize,

    /// Embedding lookup strategy
    #[config(default = "ModelKind::Factor")]
    pub kind: ModelKind,
}

impl ModelConfig {
    /// Configuration described by `options` for the given vocabulary sizes
    pub fn from_options(options: &Options, input_size: [usize; 2]) -> crate::error::Result<Self> {
        let kind: ModelKind = options.model.parse()?;
        Ok(Self::new(input_size, options.layers_size.clone())
            .with_emb_size(options.emb_size)
            .with_kind(kind))
    }

    /// Reject sizes that cannot build a model
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.input_size.contains(&0) {
            return Err(Error::UnsupportedConfiguration(format!(
                "input sizes must be positive, got {:?}",
                self.input_size
            )));
        }
        if self.emb_size == 0 {
            return Err(Error::UnsupportedConfiguration(
                "emb_size must be positive".to_string(),
            ));
        }
        if self.layers_size.contains(&0) {
            return Err(Error::UnsupportedConfiguration(format!(
                "layer sizes must be positive, got {:?}",
                self.layers_size
            )));
        }
        Ok(())
    }

    /// Width of the MLP input: both embeddings concatenated
    pub fn mlp_input_size(&self) -> usize {
        self.emb_size * 2
    }
}

/// Build the model named in `options` for a dataset with `input_size` vocabularies
pub fn get_model<B: Backend>(
    options: &Options,
    input_size: [usize; 2],
    device: &B::Device,
) -> crate::error::Result<FactorizedMlp<B>> {
    let config = ModelConfig::from_options(options, input_size)?;
    info!(
        "Building {} model: input size {:?}, embedding size {}, layers {:?}",
        config.kind, config.input_size, config.emb_size, config.layers_size
    );
    config.init(device)
}
