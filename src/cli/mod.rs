use crate::config::Options;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// fembed: factorized embeddings of genes, patients and DNA k-mers
#[derive(Parser, Debug)]
#[command(name = "fembed")]
#[command(about = "Factorized embedding models for expression and k-mer count data")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a dataset and report its size
    Inspect(InspectArgs),

    /// Run a model over a dataset and report regression error
    Evaluate(EvaluateArgs),

    /// Write the embedding tables of a model as JSON
    Export(ExportArgs),
}

/// Dataset and model options; each flag overrides the config file
#[derive(Args, Debug, Default)]
pub struct OptionArgs {
    /// JSON options file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dataset (gene, kmer)
    #[arg(long)]
    pub dataset: Option<String>,

    /// Directory holding the dataset files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// The k-mer table starts with a header line
    #[arg(long)]
    pub kmer_has_header: bool,

    /// Local directory the k-mer table is staged into
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Model (factor, bag)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Hidden layer widths, comma separated
    #[arg(long, value_delimiter = ',')]
    pub layers_size: Option<Vec<usize>>,

    /// Embedding dimension
    #[arg(long)]
    pub emb_size: Option<usize>,

    /// Batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Number of loader worker threads
    #[arg(long)]
    pub num_workers: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

impl OptionArgs {
    /// Apply command line overrides on top of `options`
    pub fn apply(&self, mut options: Options) -> Options {
        if let Some(dataset) = &self.dataset {
            options.dataset = dataset.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            options.data_dir = data_dir.clone();
        }
        if self.kmer_has_header {
            options.kmer_has_header = true;
        }
        if let Some(staging_dir) = &self.staging_dir {
            options.staging_dir = Some(staging_dir.clone());
        }
        if let Some(model) = &self.model {
            options.model = model.clone();
        }
        if let Some(layers_size) = &self.layers_size {
            options.layers_size = layers_size.clone();
        }
        if let Some(emb_size) = self.emb_size {
            options.emb_size = emb_size;
        }
        if let Some(batch_size) = self.batch_size {
            options.batch_size = batch_size;
        }
        if let Some(num_workers) = self.num_workers {
            options.num_workers = num_workers;
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        options
    }
}

/// Inspect arguments
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub options: OptionArgs,
}

/// Evaluation arguments
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub options: OptionArgs,

    /// Model checkpoint (.mpk); a freshly initialized model is used otherwise
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Output file for the evaluation report (JSON)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Export arguments
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub options: OptionArgs,

    /// Model checkpoint (.mpk); a freshly initialized model is used otherwise
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long, default_value = "embeddings.json")]
    pub output: PathBuf,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
