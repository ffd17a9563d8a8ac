//! # Worker Pool Module
//!
//! Un numero fisso di worker consuma una coda condivisa di task. Ogni
//! trasformazione gira nel blocking pool di tokio e il risultato va
//! all'aggregatore appena pronto, quindi l'ordine di completamento è arbitrario.
//!
//! ## Garanzie:
//! - ogni task inviato riporta esattamente un risultato
//! - una trasformazione che va in panic conta come fallimento
//! - `run` ritorna solo dopo l'uscita di tutti i worker
//! - la cancellazione è controllata tra un task e l'altro

use crate::batch::aggregator::{Aggregator, RunStats};
use crate::batch::path_resolver::Task;
use crate::file_manager::FileManager;
use crate::progress::ProgressSink;
use crate::transform::{Transform, TransformResult};
use anyhow::Result;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, warn};

/// Fixed-size pool executing one transform over a task list
pub struct WorkerPool {
    concurrency: usize,
    stop_receiver: Option<watch::Receiver<bool>>,
}

impl WorkerPool {
    /// Create a pool with `concurrency` workers (at least one)
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            stop_receiver: None,
        }
    }

    /// Stop dispatching new tasks once `true` is sent on the channel
    pub fn with_cancellation(mut self, stop_receiver: watch::Receiver<bool>) -> Self {
        self.stop_receiver = Some(stop_receiver);
        self
    }

    /// Create a cancellation channel for [`WorkerPool::with_cancellation`]
    pub fn create_cancellation_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    /// Run `transform` over every task and return the final statistics
    pub async fn run<T>(
        &self,
        tasks: Vec<Task>,
        transform: Arc<T>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<RunStats>
    where
        T: Transform + 'static,
    {
        let inputs: Vec<PathBuf> = tasks.iter().map(|task| task.input_path.clone()).collect();
        let total_original_size_mb =
            tokio::task::spawn_blocking(move || FileManager::total_size_mb(&inputs)).await?;
        let aggregator = Arc::new(Aggregator::new(tasks.len(), total_original_size_mb, sink));

        let (work_tx, work_rx) = mpsc::unbounded_channel::<Task>();
        for task in tasks {
            work_tx.send(task)?;
        }
        // Closing the sender lets workers exit once the queue is empty
        drop(work_tx);

        let work_rx = Arc::new(Mutex::new(work_rx));
        let workers: Vec<_> = (0..self.concurrency)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&work_rx),
                    Arc::clone(&transform),
                    Arc::clone(&aggregator),
                    self.stop_receiver.clone(),
                ))
            })
            .collect();

        for (worker_id, joined) in join_all(workers).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!("Worker {} terminated abnormally: {}", worker_id, e);
            }
        }

        Ok(aggregator.finalize().await)
    }
}

async fn worker_loop<T>(
    worker_id: usize,
    work_rx: Arc<Mutex<mpsc::UnboundedReceiver<Task>>>,
    transform: Arc<T>,
    aggregator: Arc<Aggregator>,
    stop_receiver: Option<watch::Receiver<bool>>,
) where
    T: Transform + 'static,
{
    loop {
        if should_stop(&stop_receiver) {
            debug!("Worker {} stopping on cancellation", worker_id);
            break;
        }

        let task = {
            let mut rx = work_rx.lock().await;
            match rx.recv().await {
                Some(task) => task,
                None => break,
            }
        };

        let result = execute(worker_id, &task, Arc::clone(&transform)).await;
        aggregator.on_result(&result).await;
    }
}

/// Run one transform off the async threads; a panic becomes a failure
async fn execute<T>(worker_id: usize, task: &Task, transform: Arc<T>) -> TransformResult
where
    T: Transform + 'static,
{
    let input = task.input_path.clone();
    let output = task.output_path.clone();
    debug!("Worker {} processing {} with {}", worker_id, input.display(), transform.name());

    match tokio::task::spawn_blocking(move || transform.apply(&input, &output)).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Transform crashed on {}: {}", task.input_path.display(), e);
            TransformResult::failure()
        }
    }
}

fn should_stop(stop_receiver: &Option<watch::Receiver<bool>>) -> bool {
    stop_receiver
        .as_ref()
        .map(|rx| *rx.borrow())
        .unwrap_or(false)
}
