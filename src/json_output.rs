//! # JSON Output Module
//!
//! Messaggi JSON line per l'integrazione con altri programmi.
//!
//! ## Tipi di messaggio:
//! - `start`, `progress`, `complete`
//! - `nothing_to_do`: nessun file trovato, il pool non parte
//! - `error`: errore di setup

use crate::batch::RunStats;
use crate::progress::ProgressUpdate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// JSON message type
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// A phase starts
    #[serde(rename = "start")]
    Start {
        phase: String,
        input_dir: PathBuf,
        output_dir: PathBuf,
        total_files: usize,
        workers: usize,
    },

    /// Running tallies
    #[serde(rename = "progress")]
    Progress {
        phase: String,
        completed: usize,
        total: usize,
        percentage: f64,
        success_count: usize,
        failure_count: usize,
        elapsed_seconds: f64,
    },

    /// A phase finished
    #[serde(rename = "complete")]
    Complete {
        phase: String,
        total_tasks: usize,
        success_count: usize,
        failure_count: usize,
        total_original_size_mb: f64,
        total_output_size_mb: f64,
        reduction_percent: f64,
        elapsed_seconds: f64,
    },

    /// No matching files
    #[serde(rename = "nothing_to_do")]
    NothingToDo { phase: String, input_dir: PathBuf },

    /// Setup error
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emits the message on stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(
        phase: &str,
        input_dir: PathBuf,
        output_dir: PathBuf,
        total_files: usize,
        workers: usize,
    ) -> Self {
        Self::Start {
            phase: phase.to_string(),
            input_dir,
            output_dir,
            total_files,
            workers,
        }
    }

    pub fn progress(phase: &str, update: &ProgressUpdate) -> Self {
        let percentage = if update.total > 0 {
            (update.completed as f64 / update.total as f64) * 100.0
        } else {
            0.0
        };

        Self::Progress {
            phase: phase.to_string(),
            completed: update.completed,
            total: update.total,
            percentage,
            success_count: update.success_count,
            failure_count: update.failure_count,
            elapsed_seconds: update.elapsed_seconds,
        }
    }

    pub fn complete(phase: &str, stats: &RunStats) -> Self {
        Self::Complete {
            phase: phase.to_string(),
            total_tasks: stats.total_tasks,
            success_count: stats.success_count,
            failure_count: stats.failure_count,
            total_original_size_mb: stats.total_original_size_mb,
            total_output_size_mb: stats.total_output_size_mb,
            reduction_percent: stats.reduction_percent(),
            elapsed_seconds: stats.elapsed_seconds,
        }
    }

    pub fn nothing_to_do(phase: &str, input_dir: PathBuf) -> Self {
        Self::NothingToDo {
            phase: phase.to_string(),
            input_dir,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}
