//! # Batch Converter
//!
//! Orchestratore principale di una run, divisa in due fasi:
//! 1. conversione delle sorgenti HEIC o CR2 sotto la input root in PNG
//! 2. opzionalmente, ricodifica dei PNG in JPEG con dimensione massima
//!
//! ## Responsabilità:
//! - Enumerazione dei file e verifica dei decoder prima di toccare l'output
//! - Creazione dell'albero di output speculare e mappatura in task
//! - Messaggi di avvio, "nothing to do" e statistiche finali (log o JSON)
//! - Delega dell'esecuzione al [`WorkerPool`]
//!
//! Una fase senza file corrispondenti restituisce [`RunOutcome::NothingToDo`]
//! senza avviare alcun worker. Il lavoro sul filesystem gira su
//! `spawn_blocking`.

use crate::batch::aggregator::RunStats;
use crate::batch::path_resolver::{PathResolver, Task};
use crate::batch::worker_pool::WorkerPool;
use crate::config::{Config, ConversionKind};
use crate::error::ConvertError;
use crate::file_manager::FileManager;
use crate::json_output::JsonMessage;
use crate::progress::{JsonProgress, ProgressManager, ProgressSink};
use crate::tool_resolver::ToolPathResolver;
use crate::transform::{Transform, TransformKind};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info};

/// Extensions picked up by the optimization phase
const PNG_EXTENSIONS: &[&str] = &["png", "PNG"];

/// Stage of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Conversion,
    Optimization,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Conversion => "convert",
            Phase::Optimization => "optimize",
        }
    }
}

/// Result of one phase
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunStats),
    /// No matching files; no worker was started
    NothingToDo,
}

impl RunOutcome {
    pub fn stats(&self) -> Option<&RunStats> {
        match self {
            RunOutcome::Completed(stats) => Some(stats),
            RunOutcome::NothingToDo => None,
        }
    }
}

/// Outcome of a full run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub conversion: RunOutcome,
    /// `None` when no optimization directory was configured
    pub optimization: Option<RunOutcome>,
    pub total_elapsed_seconds: f64,
}

impl BatchSummary {
    /// Failed files across both phases
    pub fn total_failures(&self) -> usize {
        let conversion = self.conversion.stats().map_or(0, |s| s.failure_count);
        let optimization = self
            .optimization
            .as_ref()
            .and_then(RunOutcome::stats)
            .map_or(0, |s| s.failure_count);
        conversion + optimization
    }
}

/// Orchestrates conversion and optimization over directory trees
pub struct BatchConverter {
    config: Config,
    resolver: ToolPathResolver,
    stop_receiver: Option<watch::Receiver<bool>>,
}

impl BatchConverter {
    /// Create a converter from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            resolver: ToolPathResolver::new(),
            stop_receiver: None,
        })
    }

    /// Look up decoders with `resolver` instead of `TOOLS_DIR` and `PATH`
    pub fn with_tool_resolver(mut self, resolver: ToolPathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Stop dispatching new files once `true` is sent on the channel
    pub fn with_cancellation(mut self, stop_receiver: watch::Receiver<bool>) -> Self {
        self.stop_receiver = Some(stop_receiver);
        self
    }

    /// Run the conversion phase, then the optimization phase if configured
    pub async fn run(&self) -> Result<BatchSummary> {
        let start_time = Instant::now();

        let conversion = self.convert().await?;

        let optimization = match self.config.optimize_output {
            Some(ref optimize_output) => {
                let png_root = &self.config.output_root;
                if self.is_cancelled() {
                    info!("Cancelled, skipping optimization");
                    None
                } else if !is_dir(png_root).await {
                    // Nothing was converted and no earlier output exists
                    self.report_nothing_to_do(Phase::Optimization, png_root);
                    Some(RunOutcome::NothingToDo)
                } else {
                    Some(
                        self.optimize(png_root, optimize_output, self.config.max_output_size_mb)
                            .await?,
                    )
                }
            }
            None => None,
        };

        let summary = BatchSummary {
            conversion,
            optimization,
            total_elapsed_seconds: start_time.elapsed().as_secs_f64(),
        };
        if !self.config.json_output {
            info!("All done in {:.2}s", summary.total_elapsed_seconds);
        }
        Ok(summary)
    }

    /// Convert every matching source under the input root to PNG
    pub async fn convert(&self) -> Result<RunOutcome> {
        let kind = self.config.conversion_kind;
        let transform = TransformKind::for_conversion(kind, self.resolver.clone());

        self.run_phase(
            Phase::Conversion,
            &self.config.input_root,
            &self.config.output_root,
            kind.extensions(),
            transform,
            Some(kind),
        )
        .await
    }

    /// Re-encode every PNG under `input_root` to a JPEG of at most
    /// `max_size_mb` under `output_root`
    pub async fn optimize(
        &self,
        input_root: &Path,
        output_root: &Path,
        max_size_mb: f64,
    ) -> Result<RunOutcome> {
        self.run_phase(
            Phase::Optimization,
            input_root,
            output_root,
            PNG_EXTENSIONS,
            TransformKind::optimization(max_size_mb),
            None,
        )
        .await
    }

    async fn run_phase(
        &self,
        phase: Phase,
        input_root: &Path,
        output_root: &Path,
        extensions: &'static [&'static str],
        transform: TransformKind,
        needs_decoder: Option<ConversionKind>,
    ) -> Result<RunOutcome> {
        let search_root = input_root.to_path_buf();
        let (input_root, sources) =
            tokio::task::spawn_blocking(move || discover(&search_root, extensions)).await??;

        if sources.is_empty() {
            self.report_nothing_to_do(phase, &input_root);
            return Ok(RunOutcome::NothingToDo);
        }

        // Before any output directory exists
        if let Some(kind) = needs_decoder {
            self.check_dependencies(kind).await?;
        }

        let destination = output_root.to_path_buf();
        let mapping_root = input_root.clone();
        let new_extension = transform.output_extension();
        let (output_root, tasks) = tokio::task::spawn_blocking(move || {
            map_to_tasks(&sources, &mapping_root, &destination, new_extension)
        })
        .await??;

        self.emit_start_message(phase, &input_root, &output_root, tasks.len());

        let sink: Arc<dyn ProgressSink> = if self.config.json_output {
            Arc::new(JsonProgress::new(phase.label()))
        } else {
            Arc::new(ProgressManager::new(tasks.len() as u64, phase.label()))
        };

        let mut pool = WorkerPool::new(self.config.workers);
        if let Some(ref stop_receiver) = self.stop_receiver {
            pool = pool.with_cancellation(stop_receiver.clone());
        }

        let stats = pool.run(tasks, Arc::new(transform), sink).await?;
        self.print_final_stats(phase, &stats);

        Ok(RunOutcome::Completed(stats))
    }

    /// At least one decoder for `kind` must be installed
    async fn check_dependencies(&self, kind: ConversionKind) -> Result<()> {
        let decoders = kind.decoders();
        let resolver = self.resolver.clone();
        let available =
            tokio::task::spawn_blocking(move || resolver.available_tools(decoders)).await?;

        if available.is_empty() {
            let hints: Vec<String> = decoders
                .iter()
                .map(|tool| format!("{} ({})", tool, ToolPathResolver::install_hint(tool)))
                .collect();
            error!("No {} decoder found", kind.label());
            return Err(ConvertError::MissingDependency(format!(
                "no {} decoder found, install one of: {}",
                kind.label(),
                hints.join(", ")
            ))
            .into());
        }

        info!("{} decoders available: {}", kind.label(), available.join(", "));
        Ok(())
    }

    fn emit_start_message(&self, phase: Phase, input_root: &Path, output_root: &Path, file_count: usize) {
        if self.config.json_output {
            JsonMessage::start(
                phase.label(),
                input_root.to_path_buf(),
                output_root.to_path_buf(),
                file_count,
                self.config.workers,
            )
            .emit();
            return;
        }

        info!("Phase: {}", phase.label());
        info!("Input directory: {}", input_root.display());
        info!("Output directory: {}", output_root.display());
        info!("Found {} files to process with {} workers", file_count, self.config.workers);
        info!(
            "Estimated time: {:.1}s",
            self.config.estimated_seconds(file_count)
        );
    }

    fn report_nothing_to_do(&self, phase: Phase, input_root: &Path) {
        if self.config.json_output {
            JsonMessage::nothing_to_do(phase.label(), PathBuf::from(input_root)).emit();
        } else {
            info!("No files to {} in {}", phase.label(), input_root.display());
        }
    }

    fn print_final_stats(&self, phase: Phase, stats: &RunStats) {
        // The JSON sink already emitted `complete`
        if self.config.json_output {
            return;
        }

        info!("=== {} complete ===", phase.label());
        info!("Files processed: {}", stats.completed());
        info!("Succeeded: {}", stats.success_count);
        info!("Failed: {}", stats.failure_count);
        info!("Original size: {:.2} MB", stats.total_original_size_mb);
        info!("Output size: {:.2} MB", stats.total_output_size_mb);
        info!("Reduction: {:.2}%", stats.reduction_percent());
        info!("Elapsed: {:.2}s", stats.elapsed_seconds);
    }

    fn is_cancelled(&self) -> bool {
        self.stop_receiver
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }
}

/// Canonical input root and the matching files below it
fn discover(
    input_root: &Path,
    extensions: &'static [&'static str],
) -> Result<(PathBuf, Vec<PathBuf>), ConvertError> {
    let input_root = input_root
        .canonicalize()
        .map_err(|e| ConvertError::path(input_root, e))?;
    let sources: Vec<PathBuf> = FileManager::find_files(&input_root, extensions)?.collect();
    Ok((input_root, sources))
}

/// Create the output root and mirror every source into a task
fn map_to_tasks(
    sources: &[PathBuf],
    input_root: &Path,
    output_root: &Path,
    new_extension: &str,
) -> Result<(PathBuf, Vec<Task>), ConvertError> {
    std::fs::create_dir_all(output_root)
        .map_err(|e| ConvertError::path(output_root, format!("cannot create directory: {}", e)))?;
    let output_root = output_root
        .canonicalize()
        .map_err(|e| ConvertError::path(output_root, e))?;

    let tasks = sources
        .iter()
        .map(|path| PathResolver::map_to_task(path, input_root, &output_root, new_extension))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((output_root, tasks))
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}
