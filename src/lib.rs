//! # Factorized embeddings
//!
//! Learns embeddings of genes, patients and DNA k-mers from expression and
//! count matrices with factorized multilayer perceptrons.
//!
//! ## Features
//!
//! - Dense (gene, patient) examples enumerated from an expression matrix
//! - Random-access k-mer count tables with optional local staging
//! - Factorized and bag-of-nucleotides embedding models on `burn`
//! - Shuffling batch loader with a worker pool
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use factorized_embeddings::config::Options;
//! use factorized_embeddings::data::{collate, get_dataset};
//! use factorized_embeddings::model::get_model;
//!
//! let options = Options::default();
//! let loader = get_dataset(&options).unwrap();
//!
//! let device = burn::backend::ndarray::NdArrayDevice::default();
//! let model = get_model::<factorized_embeddings::DefaultBackend>(
//!     &options,
//!     loader.dataset().input_size(),
//!     &device,
//! )
//! .unwrap();
//!
//! for examples in loader.batches(0) {
//!     let batch = collate::<factorized_embeddings::DefaultBackend>(&examples.unwrap(), &device).unwrap();
//!     let predictions = model.forward(batch.features).unwrap();
//!     assert_eq!(predictions.dims()[1], 1);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod utils;

use burn_ndarray::NdArray;

/// Default backend type
pub type DefaultBackend = NdArray<f32>;

/// Re-export commonly used types
pub use config::Options;
pub use data::{BatchLoader, DatasetAdapter, Example, Features};
pub use error::{Error, Result};
pub use model::{architecture::FactorizedMlp, ModelConfig, ModelKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - factorized embeddings of genes, patients and k-mers",
        NAME, VERSION
    )
}
