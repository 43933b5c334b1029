pub mod batcher;
pub mod dataset;
pub mod expression;
pub mod kmer;
pub mod loader;
pub mod pairs;
pub mod staging;

pub use batcher::{collate, get_dataset, BatchLoader, ExampleBatch};
pub use dataset::{DatasetAdapter, GeneDataset, KmerDataset, Transform};

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Dataset selected by the `dataset` option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Gene x patient expression matrix
    Gene,
    /// DNA k-mer count table
    Kmer,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Gene => "gene",
            DatasetKind::Kmer => "kmer",
        }
    }
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gene" => Ok(DatasetKind::Gene),
            "kmer" => Ok(DatasetKind::Kmer),
            other => Err(Error::UnsupportedConfiguration(format!(
                "Unknown dataset {:?} (expected \"gene\" or \"kmer\")",
                other
            ))),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model inputs of a single example
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    /// One gene id and one patient id
    GenePair { gene: usize, patient: usize },
    /// Per-position nucleotide codes of a k-mer and the patient id
    Kmer { codes: Vec<u8>, patient: usize },
}

impl Features {
    /// Flat feature row fed to the model.
    ///
    /// Gene pairs give `[gene, patient]`; k-mers give the codes followed by the
    /// patient id, so every row of a k-mer table has the same width.
    pub fn to_row(&self) -> Vec<i64> {
        match self {
            Features::GenePair { gene, patient } => vec![*gene as i64, *patient as i64],
            Features::Kmer { codes, patient } => codes
                .iter()
                .map(|&c| c as i64)
                .chain(std::iter::once(*patient as i64))
                .collect(),
        }
    }

    /// Width of [`Features::to_row`]
    pub fn width(&self) -> usize {
        match self {
            Features::GenePair { .. } => 2,
            Features::Kmer { codes, .. } => codes.len() + 1,
        }
    }
}

/// A training example: features and a log-scale scalar target
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub features: Features,
    pub label: f32,
}
