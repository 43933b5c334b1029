use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options consumed by the dataset and model factories.
///
/// `dataset` and `model` are kept as string tags; they are resolved into
/// [`DatasetKind`](crate::data::DatasetKind) and [`ModelKind`](crate::model::ModelKind)
/// by the factories, which reject unknown tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Dataset tag ("gene" or "kmer")
    pub dataset: String,
    /// Directory holding the dataset files
    pub data_dir: PathBuf,
    /// Expression matrix file (genes x patients)
    pub matrix_file: String,
    /// Tissue type label file, one entry per patient
    pub types_file: String,
    /// Tissue subtype label file, one entry per patient
    pub subtypes_file: String,
    /// K-mer count table file
    pub kmer_file: String,
    /// The k-mer table starts with a header line
    pub kmer_has_header: bool,
    /// Local directory the k-mer table is copied to before random access
    pub staging_dir: Option<PathBuf>,
    /// Batch size
    pub batch_size: usize,
    /// Shuffle example order every epoch
    pub shuffle: bool,
    /// Number of worker threads fetching items (0 = caller thread)
    pub num_workers: usize,
    /// Random seed for shuffling
    pub seed: u64,
    /// Model tag ("factor" or "bag")
    pub model: String,
    /// Hidden layer widths, in order
    pub layers_size: Vec<usize>,
    /// Embedding dimension shared by both tables
    pub emb_size: usize,
    /// Replace expression values by log10(value + 1)
    pub log_transform: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dataset: "gene".to_string(),
            data_dir: PathBuf::from("."),
            matrix_file: "30by30_dataset.npy".to_string(),
            types_file: "30by30_types.npy".to_string(),
            subtypes_file: "30by30_subtypes.npy".to_string(),
            kmer_file: "kmers.tsv".to_string(),
            kmer_has_header: false,
            staging_dir: None,
            batch_size: 32,
            shuffle: true,
            num_workers: 1,
            seed: 2026,
            model: "factor".to_string(),
            layers_size: vec![150, 100, 75, 50, 25, 10],
            emb_size: 2,
            log_transform: true,
        }
    }
}

impl Options {
    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let json = fs::read_to_string(path)?;
        let options: Options = serde_json::from_str(&json)?;
        debug!("Loaded options from {:?}: {:?}", path, options);

        options.validate()?;
        Ok(options)
    }

    /// Save options as pretty-printed JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check numeric settings that would make the pipeline meaningless
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::UnsupportedConfiguration(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.emb_size == 0 {
            return Err(Error::UnsupportedConfiguration(
                "emb_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Full path of a file inside `data_dir`
    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}
