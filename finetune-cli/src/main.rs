//! finetune CLI — run repeated fine-tuning experiments from the terminal.
//!
//! Without a subcommand the experiment loop runs with the given flags.

mod commands;

use clap::Parser;
use finetune_ml::RunOverrides;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Fine-tune pretrained image classifiers on Oxford-IIIT Pets, repeatedly.
#[derive(Parser, Debug)]
#[command(name = "finetune", version, about, long_about = None)]
struct Cli {
    /// Batch size [default: 64]
    #[arg(long = "batch_size", global = true)]
    batch_size: Option<usize>,

    /// Epochs after the frozen warm-up epoch [default: 5]
    #[arg(long, global = true)]
    epochs: Option<usize>,

    /// Number of independent repetitions [default: 3]
    #[arg(long = "num_experiments", global = true)]
    num_experiments: Option<usize>,

    /// Peak learning rate [default: 0.002]
    #[arg(long = "learning_rate", global = true)]
    learning_rate: Option<f64>,

    /// Side of the square input images [default: 224]
    #[arg(long = "img_size", global = true)]
    img_size: Option<u32>,

    /// Resize method: crop, pad or squish [default: crop]
    #[arg(long = "resize_method", global = true)]
    resize_method: Option<String>,

    /// Model name, timm or torchvision [default: resnet34]
    #[arg(long = "model_name", global = true)]
    model_name: Option<String>,

    /// Parameter splitter, "default" or anything else for none [default: default]
    #[arg(long = "split_func", global = true)]
    split_func: Option<String>,

    /// Use concat pooling in the head
    #[arg(long = "concat_pool", global = true)]
    concat_pool: bool,

    /// Seed of the train/validation split [default: 42]
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Resolve the model through the torchvision catalog
    #[arg(long = "force_torchvision", global = true)]
    force_torchvision: bool,

    /// Tracking project name [default: fine_tune_timm]
    #[arg(long = "wandb_project", global = true)]
    wandb_project: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    /// The run flags that were actually given.
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            batch_size: self.batch_size,
            epochs: self.epochs,
            num_experiments: self.num_experiments,
            learning_rate: self.learning_rate,
            img_size: self.img_size,
            resize_method: self.resize_method.clone(),
            model_name: self.model_name.clone(),
            split_func: self.split_func.clone(),
            concat_pool: self.concat_pool,
            seed: self.seed,
            force_torchvision: self.force_torchvision,
            wandb_project: self.wandb_project.clone(),
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List the torchvision catalog
    Models,
    /// Build the data pipeline and describe it
    Data,
    /// List locally tracked runs
    Runs {
        /// Only runs of this project
        #[arg(long)]
        project: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "finetune", "finetune")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "finetune.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = finetune_ml::load_config(
        Some(&workspace),
        cli.config.as_deref(),
        Some(&cli.overrides()),
    )
    .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    match cli.command {
        Some(command) => commands::handle_command(command, &config, &workspace).await,
        None => commands::run_experiments(&config, &workspace).await,
    }
}
