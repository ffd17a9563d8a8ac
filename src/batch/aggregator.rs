//! # Result Aggregation Module
//!
//! Unico punto in cui cambiano le statistiche della run. I worker chiamano
//! `on_result` in concorrenza; aggiornamento e notifica del progresso
//! avvengono sotto lo stesso lock, quindi i conteggi non tornano mai indietro.

use crate::file_manager::FileManager;
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::transform::TransformResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Statistics of one batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_tasks: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_original_size_mb: f64,
    pub total_output_size_mb: f64,
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Tasks that reported a result
    pub fn completed(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.total_original_size_mb, self.total_output_size_mb)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Succeeded: {} | Failed: {} | Original: {:.2} MB | Output: {:.2} MB ({:.2}% reduction) | Time: {:.2}s",
            self.success_count,
            self.failure_count,
            self.total_original_size_mb,
            self.total_output_size_mb,
            self.reduction_percent(),
            self.elapsed_seconds
        )
    }
}

/// Thread-safe accumulator for worker results
pub struct Aggregator {
    started: Instant,
    stats: Mutex<RunStats>,
    sink: Arc<dyn ProgressSink>,
}

impl Aggregator {
    /// Start the clock for a run of `total_tasks` tasks
    pub fn new(total_tasks: usize, total_original_size_mb: f64, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            started: Instant::now(),
            stats: Mutex::new(RunStats {
                total_tasks,
                total_original_size_mb,
                ..RunStats::default()
            }),
            sink,
        }
    }

    /// Record one completed task and notify the sink
    pub async fn on_result(&self, result: &TransformResult) -> ProgressUpdate {
        let mut stats = self.stats.lock().await;

        if result.ok {
            stats.success_count += 1;
            if let Some(size_mb) = result.size_mb {
                stats.total_output_size_mb += size_mb;
            }
        } else {
            stats.failure_count += 1;
        }
        stats.elapsed_seconds = self.started.elapsed().as_secs_f64();

        let update = ProgressUpdate {
            completed: stats.completed(),
            total: stats.total_tasks,
            success_count: stats.success_count,
            failure_count: stats.failure_count,
            elapsed_seconds: stats.elapsed_seconds,
        };
        self.sink.on_progress(&update);
        update
    }

    /// Stop the clock and hand the final statistics to the sink
    pub async fn finalize(&self) -> RunStats {
        let mut stats = self.stats.lock().await;
        stats.elapsed_seconds = self.started.elapsed().as_secs_f64();

        let final_stats = stats.clone();
        self.sink.on_finish(&final_stats);
        final_stats
    }
}
