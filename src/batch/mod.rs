//! # Batch Module
//!
//! Motore batch concorrente, diviso in sottomoduli:
//! - `converter`: orchestratore delle fasi di conversione e ottimizzazione
//! - `worker_pool`: worker che consumano una coda condivisa
//! - `aggregator`: statistiche della run
//! - `path_resolver`: mappatura dei file di input in task

pub mod aggregator;
pub mod converter;
pub mod path_resolver;
pub mod worker_pool;

pub use aggregator::{Aggregator, RunStats};
pub use converter::{BatchConverter, BatchSummary, Phase, RunOutcome};
pub use path_resolver::{PathResolver, Task};
pub use worker_pool::WorkerPool;
