//! # Photo Batch Converter - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (su stderr)
//! - Unione di file di configurazione e argomenti CLI, poi validazione
//! - Cancellazione con Ctrl-C e avvio del [`BatchConverter`]
//!
//! ## Esempio di utilizzo:
//! ```bash
//! photo-convert heic ~/Pictures/heic ~/Pictures/png --optimize-output ~/Pictures/jpg --max-size-mb 10
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use photo_batch_converter::json_output::JsonMessage;
use photo_batch_converter::tool_resolver::ToolPathResolver;
use photo_batch_converter::{BatchConverter, Config, ConversionKind, WorkerPool};

#[derive(Parser)]
#[command(name = "photo-convert")]
#[command(about = "Convert HEIC and CR2 photo trees to PNG, optionally re-encoding to size-capped JPEG")]
struct Args {
    /// Source format to convert
    #[arg(value_enum)]
    kind: Option<ConversionKind>,

    /// Directory searched recursively for source files
    input: Option<PathBuf>,

    /// Directory receiving the PNG files
    output: Option<PathBuf>,

    /// Number of parallel workers (even, up to the hardware thread count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Re-encode the PNG files to JPEG in this directory
    #[arg(long)]
    optimize_output: Option<PathBuf>,

    /// Maximum size of each JPEG in MB
    #[arg(long)]
    max_size_mb: Option<f64>,

    /// Look up decoders only in this directory, never on PATH
    #[arg(long)]
    tools_dir: Option<PathBuf>,

    /// Output progress as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Load settings from a JSON file; command line values take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the resolved settings to a JSON file before running
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so JSON lines on stdout stay parseable
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let json_output = args.json;
    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if json_output {
                JsonMessage::error("Batch conversion failed".to_string(), Some(format!("{:#}", e))).emit();
            }
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = build_config(&args).await?;

    if let Some(ref path) = args.save_config {
        config.save_to_file(path).await?;
        info!("Saved configuration to {}", path.display());
    }

    let (stop_tx, stop_rx) = WorkerPool::create_cancellation_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing files in progress");
            let _ = stop_tx.send(true);
        }
    });

    let mut converter = BatchConverter::new(config)?.with_cancellation(stop_rx);
    if let Some(ref dir) = args.tools_dir {
        if !dir.is_dir() {
            return Err(anyhow::anyhow!("Tools directory does not exist: {}", dir.display()));
        }
        converter = converter.with_tool_resolver(ToolPathResolver::bundled_only(dir.clone()));
    }
    let summary = converter.run().await?;

    if summary.total_failures() > 0 {
        warn!("{} files failed, see the log above", summary.total_failures());
    }

    Ok(())
}

/// Merge the optional config file with command line values and validate
async fn build_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => {
            if !path.is_file() {
                return Err(anyhow::anyhow!("Config file does not exist: {}", path.display()));
            }
            Config::from_file(path).await?
        }
        None => {
            if args.kind.is_none() || args.input.is_none() || args.output.is_none() {
                return Err(anyhow::anyhow!(
                    "KIND, INPUT and OUTPUT are required unless --config is given"
                ));
            }
            Config::default()
        }
    };

    if let Some(kind) = args.kind {
        config.conversion_kind = kind;
    }
    if let Some(ref input) = args.input {
        config.input_root = input.clone();
    }
    if let Some(ref output) = args.output {
        config.output_root = output.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(ref optimize_output) = args.optimize_output {
        config.optimize_output = Some(optimize_output.clone());
    }
    if let Some(max_size_mb) = args.max_size_mb {
        config.max_output_size_mb = max_size_mb;
    }
    config.json_output |= args.json;

    config.validate()?;
    Ok(config)
}
