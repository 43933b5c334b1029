use std::io;
use std::path::PathBuf;

/// Errors raised while loading datasets or running the embedding models.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Dataset file not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid residue {residue:?} at position {position} in k-mer {kmer:?}")]
    InvalidResidue {
        kmer: String,
        residue: char,
        position: usize,
    },

    #[error("Invalid nucleotide code {0} (expected 0..=3)")]
    InvalidCode(u8),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Index {index} out of range for {table} embedding table of size {size}")]
    IndexOutOfRange {
        table: &'static str,
        index: i64,
        size: usize,
    },

    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    #[error("Invalid expression value {value} at gene {gene}, patient {patient}")]
    InvalidValue {
        gene: usize,
        patient: usize,
        value: f64,
    },

    #[error("I/O error")]
    Io(#[from] io::Error),

    #[error("Failed to read array file {path:?}")]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("Failed to parse table")]
    Csv(#[from] csv::Error),

    #[error("Failed to build worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to (de)serialize JSON")]
    Json(#[from] serde_json::Error),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Tensor data error: {0}")]
    TensorData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
