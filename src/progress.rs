//! # Progress Reporting Module
//!
//! Questo modulo gestisce la visualizzazione del progresso.
//!
//! ## Responsabilità:
//! - `ProgressSink`: interfaccia usata dall'aggregatore
//! - `ProgressManager`: progress bar su terminale con `indicatif`
//! - `JsonProgress`: progresso come JSON line su stdout
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) ok: 149 | failed: 1 | 135.20s
//! ```

use crate::batch::RunStats;
use crate::json_output::JsonMessage;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Running tallies delivered after each completed task
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub elapsed_seconds: f64,
}

/// Receives per-task progress and the final statistics of a run
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
    fn on_finish(&self, stats: &RunStats);
}

/// Manages the terminal progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress bar labelled with `phase`
    pub fn new(total_files: u64, phase: &str) -> Self {
        let bar = ProgressBar::new(total_files);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.set_prefix(phase.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }
}

impl ProgressSink for ProgressManager {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.bar.set_position(update.completed as u64);
        self.bar.set_message(format!(
            "ok: {} | failed: {} | {:.2}s",
            update.success_count, update.failure_count, update.elapsed_seconds
        ));
    }

    fn on_finish(&self, stats: &RunStats) {
        self.bar.finish_with_message(stats.format_summary());
    }
}

/// Emits progress as JSON lines
#[derive(Debug, Clone)]
pub struct JsonProgress {
    phase: String,
}

impl JsonProgress {
    pub fn new(phase: &str) -> Self {
        Self {
            phase: phase.to_string(),
        }
    }
}

impl ProgressSink for JsonProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        JsonMessage::progress(&self.phase, update).emit();
    }

    fn on_finish(&self, stats: &RunStats) {
        JsonMessage::complete(&self.phase, stats).emit();
    }
}
