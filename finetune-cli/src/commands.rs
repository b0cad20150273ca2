//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use finetune_ml::config::TrackingBackend;
use finetune_ml::data::{self, DatasetProvider, LocalDataset, PipelineParams, RemoteDataset};
use finetune_ml::tracking::list_runs;
use finetune_ml::{
    AppConfig, ExperimentRunner, FastaiTrainer, GPU_MEM_KEY, LocalTracker, MemoryTracker,
    PythonRuntime, TorchvisionArch, Tracker,
};
use std::path::Path;
use std::sync::Arc;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: &AppConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Models => handle_models(),
        Commands::Data => handle_data(config).await,
        Commands::Runs { project } => handle_runs(config, project.as_deref()),
        Commands::Config { action } => handle_config(action, config, workspace),
    }
}

/// Run the experiment loop with the effective configuration.
pub async fn run_experiments(config: &AppConfig, workspace: &Path) -> anyhow::Result<()> {
    let runtime = PythonRuntime::from_config(&config.python, workspace.to_path_buf());
    let runner = ExperimentRunner::new(
        tracker(config),
        Arc::new(FastaiTrainer::new(runtime)),
        dataset_provider(config),
    )
    .with_images_subdir(config.data.images_subdir.clone());

    println!("\n >> Training {}\n", config.run.model_name);
    let outcomes = runner.run(&config.run).await?;

    println!("Completed {} repetition(s):", outcomes.len());
    for outcome in &outcomes {
        let accuracy = outcome
            .report
            .metrics
            .last("accuracy")
            .map(|a| format!("{a:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{}] {}  {}  accuracy {}  {} {:.2} GiB",
            outcome.index, outcome.run_id, outcome.model, accuracy, GPU_MEM_KEY, outcome.gpu_mem
        );
    }
    Ok(())
}

fn tracker(config: &AppConfig) -> Arc<dyn Tracker> {
    match config.tracking.backend {
        TrackingBackend::Local => Arc::new(LocalTracker::from_config(&config.tracking)),
        TrackingBackend::Disabled => Arc::new(MemoryTracker::new()),
    }
}

fn dataset_provider(config: &AppConfig) -> Arc<dyn DatasetProvider> {
    match &config.data.local_path {
        Some(root) => Arc::new(LocalDataset::new(root.clone())),
        None => Arc::new(RemoteDataset::new(
            config.data.dataset_url.clone(),
            config.data.cache_dir.clone(),
        )),
    }
}

fn handle_models() -> anyhow::Result<()> {
    println!("Torchvision catalog ({}):", TorchvisionArch::ALL.len());
    let mut family = "";
    for arch in TorchvisionArch::ALL {
        if arch.family() != family {
            family = arch.family();
            println!("  {family}");
        }
        println!("    {arch}");
    }
    println!("\nAny other name is passed to timm unless --force_torchvision is set.");
    Ok(())
}

async fn handle_data(config: &AppConfig) -> anyhow::Result<()> {
    let provider = dataset_provider(config);
    let params = PipelineParams::from(&config.run);
    let dls = data::get_pets(provider.as_ref(), &config.data.images_subdir, &params).await?;

    println!("Dataset:    {}", dls.root.display());
    println!("Classes:    {}", dls.vocab.len());
    println!(
        "Items:      {} train / {} valid",
        dls.train.items().len(),
        dls.valid.items().len()
    );
    println!(
        "Batches:    {} train / {} valid",
        dls.train.len(),
        dls.valid.len()
    );
    println!(
        "Batch size: {} (last partial train batch dropped)",
        dls.train.batch_size()
    );
    println!("Resize:     {} to {}px", dls.resize.method, dls.resize.size);
    Ok(())
}

fn handle_runs(config: &AppConfig, project: Option<&str>) -> anyhow::Result<()> {
    let runs: Vec<_> = list_runs(&config.tracking.root_dir)?
        .into_iter()
        .filter(|r| project.is_none_or(|p| r.record.project == p))
        .collect();
    if runs.is_empty() {
        println!("No runs under {}", config.tracking.root_dir.display());
        return Ok(());
    }

    println!("Runs ({}):", runs.len());
    for run in &runs {
        let gpu_mem = run
            .summary
            .get(GPU_MEM_KEY)
            .map(|g| format!("{g:.2} GiB"))
            .unwrap_or_else(|| "-".to_string());
        let duration = run
            .record
            .duration_secs()
            .map(|d| format!("{d:.0}s"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:<16} {:<12} {:<8} {}  {:>3} steps  {:>7}  {}",
            run.record.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.record.project,
            run.record.group,
            run.record.status.to_string(),
            run.record.run_id,
            run.steps,
            duration,
            gpu_mem
        );
    }
    Ok(())
}

fn handle_config(action: ConfigAction, config: &AppConfig, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# workspace: {}", workspace.display());
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
