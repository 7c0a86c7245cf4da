mod config;
mod input;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use input::frame_from_value;
use serde_json::Value;
use singularity_core::{DataSingularity, Payload};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "singularity")]
#[command(about = "Content-addressed record store with integrity checks and replication")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "singularity.yaml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputShape {
    /// Objects become records, arrays become sequences
    Auto,
    /// `{"columns": [...], "rows": [[...]]}` or an array of row objects
    Frame,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a JSON document and print its id
    Ingest {
        /// JSON file to ingest
        file: PathBuf,

        #[arg(long, value_enum, default_value = "auto")]
        shape: InputShape,

        #[arg(long, default_value_t = singularity_core::operations::DEFAULT_DIMENSION_TAG)]
        dimension_tag: i64,
    },
    /// Print a stored payload as JSON
    Retrieve { id: String },
    /// Write a full snapshot of the store
    Backup {
        /// Directory for the backup file; defaults to `backup.dir`
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Load every record of a backup file into the store
    Restore { file: PathBuf },
    /// Copy the given ids to another store
    Transfer {
        /// Target connection string; defaults to `replication.target`
        #[arg(long)]
        target: Option<String>,

        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Copy every record to another store
    Sync {
        #[arg(long)]
        target: Option<String>,
    },
    /// Print record count
    Stats,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "singularity=info,singularity_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(error) = run(cli.command, &cfg) {
        tracing::error!("{:#}", error);
        std::process::exit(1);
    }
}

fn run(command: Commands, cfg: &Config) -> anyhow::Result<()> {
    let store = DataSingularity::open(cfg.store_options())
        .with_context(|| format!("failed to open store {}", cfg.store.connection))?;

    match command {
        Commands::Ingest {
            file,
            shape,
            dimension_tag,
        } => {
            let raw = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let value: Value = serde_json::from_slice(&raw)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;

            let payload = match shape {
                InputShape::Auto => Payload::from_value(value)?,
                InputShape::Frame => Payload::Frame(frame_from_value(value)?),
            };

            let id = store.ingest_with_tag(payload, dimension_tag)?;
            println!("{}", id);
        }
        Commands::Retrieve { id } => {
            let payload = store.retrieve(&id)?;
            println!("{}", serde_json::to_string_pretty(&payload.into_value())?);
        }
        Commands::Backup { dir } => {
            let dir = dir
                .or_else(|| cfg.backup_dir().cloned())
                .context("no backup directory given and backup.dir is not configured")?;
            let path = store.backup(&dir)?;
            println!("{}", path.display());
        }
        Commands::Restore { file } => {
            let result = store.restore(&file)?;
            println!(
                "restored {} records ({} already present) from backup created at {}",
                result.restored, result.already_present, result.metadata.created_at
            );
        }
        Commands::Transfer { target, ids } => {
            let target = resolve_target(target, cfg)?;
            let wormhole = store.create_wormhole(&target)?;
            let result = wormhole.transfer(ids);
            report_transfer(result)?;
        }
        Commands::Sync { target } => {
            let target = resolve_target(target, cfg)?;
            let wormhole = store.create_wormhole(&target)?;
            let result = wormhole.sync_all()?;
            report_transfer(result)?;
        }
        Commands::Stats => {
            println!("{} records in {}", store.len()?, cfg.store.connection);
        }
    }

    Ok(())
}

fn resolve_target(target: Option<String>, cfg: &Config) -> anyhow::Result<String> {
    target
        .or_else(|| cfg.replication_target().map(str::to_string))
        .context("no target given and replication.target is not configured")
}

fn report_transfer(result: singularity_core::operations::TransferOperationResult) -> anyhow::Result<()> {
    for id in &result.transferred {
        println!("{}", id);
    }

    let failed = result.failures.len();
    for failure in result.failures {
        eprintln!("{}", failure.into_error());
    }

    if failed > 0 {
        bail!(
            "transfer {} completed with {} failed records",
            result.transfer_id,
            failed
        );
    }
    Ok(())
}
