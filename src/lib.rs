//! # Photo Batch Converter Library
//!
//! Conversione concorrente di alberi di foto HEIC/HEIF e CR2 in PNG, con una
//! seconda fase opzionale che ricodifica i PNG in JPEG di dimensione limitata.
//!
//! ## Architettura:
//! - `config`: configurazione della run e validazione
//! - `error`: errori per singolo file e di setup
//! - `file_manager`: ricerca ricorsiva dei file e dimensioni
//! - `tool_resolver`: ricerca dei decoder esterni
//! - `transform`: conversioni per file (`HeicToPng`, `RawToPng`, `PngToJpeg`)
//! - `batch`: mappatura dei task, worker pool, aggregazione e orchestrazione
//! - `progress`: progress bar e progresso JSON
//! - `json_output`: messaggi JSON line per consumatori programmatici
//!
//! ## Esempio di utilizzo:
//! ```rust,ignore
//! use photo_batch_converter::{BatchConverter, Config, ConversionKind};
//!
//! let config = Config {
//!     conversion_kind: ConversionKind::Heic,
//!     input_root: "/photos/heic".into(),
//!     output_root: "/photos/png".into(),
//!     ..Default::default()
//! };
//! let summary = BatchConverter::new(config)?.run().await?;
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod progress;
pub mod tool_resolver;
pub mod transform;
pub mod utils;

pub use batch::{BatchConverter, BatchSummary, RunOutcome, RunStats, Task, WorkerPool};
pub use config::{Config, ConversionKind};
pub use error::ConvertError;
pub use transform::{Transform, TransformKind, TransformResult};
