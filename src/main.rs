use anyhow::{Context, Result};
use burn::backend::NdArray;
use factorized_embeddings::cli::{parse_args, setup_logging, Commands, EvaluateArgs, ExportArgs, InspectArgs, OptionArgs};
use factorized_embeddings::config::Options;
use factorized_embeddings::data::{get_dataset, DatasetAdapter};
use factorized_embeddings::evaluate::{evaluate, export_embeddings};
use factorized_embeddings::model::checkpoint::load_model;
use factorized_embeddings::model::get_model;
use factorized_embeddings::utils::format_number;
use factorized_embeddings::FactorizedMlp;
use std::path::Path;
use tracing::{error, info};

type CpuBackend = NdArray<f32>;

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", factorized_embeddings::info());

    let result = match cli.command {
        Commands::Inspect(args) => run_inspect(args),
        Commands::Evaluate(args) => run_evaluate(args),
        Commands::Export(args) => run_export(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn resolve_options(args: &OptionArgs) -> Result<Options> {
    let options = match &args.config {
        Some(path) => Options::from_json_file(path)
            .with_context(|| format!("Failed to load options from {:?}", path))?,
        None => Options::default(),
    };
    let options = args.apply(options);
    options.validate().context("Invalid options")?;
    Ok(options)
}

fn build_model(
    options: &Options,
    input_size: [usize; 2],
    checkpoint: Option<&Path>,
    device: &<CpuBackend as burn::tensor::backend::Backend>::Device,
) -> Result<FactorizedMlp<CpuBackend>> {
    match checkpoint {
        Some(path) => {
            let (model, metadata) = load_model::<CpuBackend, _>(path, device)
                .with_context(|| format!("Failed to load model from {:?}", path))?;
            anyhow::ensure!(
                metadata.model_config.input_size == input_size,
                "Checkpoint input size {:?} does not match dataset input size {:?}",
                metadata.model_config.input_size,
                input_size
            );
            Ok(model)
        }
        None => get_model::<CpuBackend>(options, input_size, device).context("Failed to build model"),
    }
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let options = resolve_options(&args.options)?;

    let dataset = DatasetAdapter::from_options(&options).context("Failed to load dataset")?;

    info!("Dataset: {}", dataset.kind());
    info!("Examples: {}", format_number(dataset.len()));
    info!("Input size: {:?}", dataset.input_size());
    for (key, values) in dataset.extra_info() {
        info!("Extra info {:?}: {} entries", key, values.len());
    }

    if !dataset.is_empty() {
        let example = dataset.item_at(0).context("Failed to read first example")?;
        info!("First example: {:?}", example);
    }

    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let options = resolve_options(&args.options)?;
    let device = Default::default();

    info!("Loading data...");
    let loader = get_dataset(&options).context("Failed to load dataset")?;

    let model = build_model(
        &options,
        loader.dataset().input_size(),
        args.checkpoint.as_deref(),
        &device,
    )?;

    info!("Running evaluation...");
    let summary = evaluate(&model, &loader, &device, true).context("Evaluation failed")?;
    summary.log();

    if let Some(output) = args.output {
        summary.save_json(&output)?;
        info!("Evaluation report saved to: {:?}", output);
    }

    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    let options = resolve_options(&args.options)?;
    let device = Default::default();

    let dataset = DatasetAdapter::from_options(&options).context("Failed to load dataset")?;

    let model = build_model(
        &options,
        dataset.input_size(),
        args.checkpoint.as_deref(),
        &device,
    )?;

    export_embeddings(&model, dataset.extra_info(), &args.output)
        .context("Failed to export embeddings")?;
    info!("Embeddings saved to: {:?}", args.output);

    Ok(())
}
