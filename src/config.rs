//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione passata al motore batch.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` e il tipo di conversione `ConversionKind`
//! - Validazione dei parametri prima di qualsiasi lavoro
//! - Caricamento/salvataggio della configurazione da/verso file JSON
//! - Opzioni di thread e stima del tempo di esecuzione
//!
//! ## Parametri di configurazione:
//! - `conversion_kind`: famiglia di sorgenti (`heic` o `raw`)
//! - `input_root`: directory esplorata ricorsivamente
//! - `output_root`: directory speculare che riceve i PNG
//! - `workers`: numero di worker, uno dei valori di [`thread_options`]
//! - `optimize_output`: se presente, i PNG vengono ricodificati in JPEG qui
//! - `max_output_size_mb`: dimensione massima di ogni JPEG (default: 15)
//! - `json_output`: messaggi JSON invece della progress bar
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     conversion_kind: ConversionKind::Raw,
//!     input_root: "/photos/raw".into(),
//!     output_root: "/photos/png".into(),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::tool_resolver::{HEIC_DECODERS, RAW_DECODERS};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Seconds per file used for the pre-run time estimate
const ESTIMATED_SECONDS_PER_FILE: f64 = 0.5;

/// Default JPEG size cap in MB
pub const DEFAULT_MAX_OUTPUT_SIZE_MB: f64 = 15.0;

/// Source family handled by the conversion phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConversionKind {
    /// HEIC/HEIF images
    Heic,
    /// Canon CR2 raw files
    Raw,
}

impl ConversionKind {
    /// Extensions matched case-sensitively during enumeration
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ConversionKind::Heic => &["heic", "HEIC", "heif", "HEIF"],
            ConversionKind::Raw => &["cr2", "CR2"],
        }
    }

    /// External decoders able to read this family, in order of preference
    pub fn decoders(&self) -> &'static [&'static str] {
        match self {
            ConversionKind::Heic => HEIC_DECODERS,
            ConversionKind::Raw => RAW_DECODERS,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConversionKind::Heic => "HEIC",
            ConversionKind::Raw => "CR2",
        }
    }
}

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub conversion_kind: ConversionKind,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub workers: usize,
    /// Destination of the optional JPEG optimization phase
    pub optimize_output: Option<PathBuf>,
    pub max_output_size_mb: f64,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            conversion_kind: ConversionKind::Heic,
            input_root: PathBuf::from("."),
            output_root: PathBuf::from("converted"),
            workers: default_workers(),
            optimize_output: None,
            max_output_size_mb: DEFAULT_MAX_OUTPUT_SIZE_MB,
            json_output: false,
        }
    }
}

/// Hardware threads available to this process
pub fn hardware_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Valid worker counts: even numbers from 2 up to the hardware thread count.
/// Single-threaded hosts get `[1]`.
pub fn thread_options() -> Vec<usize> {
    thread_options_for(hardware_threads())
}

fn thread_options_for(threads: usize) -> Vec<usize> {
    if threads < 2 {
        return vec![1];
    }
    (2..=threads).step_by(2).collect()
}

/// Largest valid worker count
pub fn default_workers() -> usize {
    thread_options().last().copied().unwrap_or(1)
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.input_root.is_dir() {
            return Err(anyhow::anyhow!(
                "Input directory does not exist: {}",
                self.input_root.display()
            ));
        }

        if !parent_exists(&self.output_root) {
            return Err(anyhow::anyhow!(
                "Parent of output directory does not exist: {}",
                self.output_root.display()
            ));
        }

        if let Some(ref optimize_output) = self.optimize_output {
            if !parent_exists(optimize_output) {
                return Err(anyhow::anyhow!(
                    "Parent of optimization directory does not exist: {}",
                    optimize_output.display()
                ));
            }
        }

        let options = thread_options();
        if !options.contains(&self.workers) {
            return Err(anyhow::anyhow!(
                "Invalid number of workers {}. Choose one of {:?}",
                self.workers,
                options
            ));
        }

        if !(self.max_output_size_mb > 0.0) {
            return Err(anyhow::anyhow!("Maximum output size must be greater than 0 MB"));
        }

        Ok(())
    }

    /// Rough wall-clock estimate for converting `file_count` files
    pub fn estimated_seconds(&self, file_count: usize) -> f64 {
        file_count as f64 * ESTIMATED_SECONDS_PER_FILE / self.workers.max(1) as f64
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// A relative path such as `out` has the current directory as parent
fn parent_exists(path: &Path) -> bool {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => true,
        Some(parent) => parent.is_dir(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let input = dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        Config {
            input_root: input,
            output_root: dir.path().join("out"),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        assert!(config.validate().is_ok());

        config.workers = 3;
        assert!(config.validate().is_err());

        config.workers = default_workers();
        config.max_output_size_mb = 0.0;
        assert!(config.validate().is_err());

        config.max_output_size_mb = 15.0;
        config.output_root = dir.path().join("missing").join("out");
        assert!(config.validate().is_err());

        config.output_root = dir.path().join("out");
        config.input_root = dir.path().join("nope");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.conversion_kind, ConversionKind::Heic);
        assert_eq!(config.max_output_size_mb, 15.0);
        assert!(config.optimize_output.is_none());
        assert!(!config.json_output);
        assert!(thread_options().contains(&config.workers));
    }

    #[test]
    fn test_thread_options() {
        assert_eq!(thread_options_for(8), vec![2, 4, 6, 8]);
        assert_eq!(thread_options_for(5), vec![2, 4]);
        assert_eq!(thread_options_for(2), vec![2]);
        assert_eq!(thread_options_for(1), vec![1]);
    }

    #[test]
    fn test_extension_sets() {
        assert!(ConversionKind::Heic.extensions().contains(&"HEIF"));
        assert_eq!(ConversionKind::Raw.extensions(), &["cr2", "CR2"]);
        assert_eq!(ConversionKind::Heic.decoders()[0], "heif-convert");
        assert!(!ConversionKind::Raw.decoders().contains(&"heif-convert"));
    }

    #[test]
    fn test_estimated_seconds() {
        let config = Config {
            workers: 4,
            ..Default::default()
        };
        assert_eq!(config.estimated_seconds(40), 5.0);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            conversion_kind: ConversionKind::Raw,
            input_root: PathBuf::from("/photos/raw"),
            output_root: PathBuf::from("/photos/png"),
            workers: 2,
            optimize_output: Some(PathBuf::from("/photos/jpg")),
            max_output_size_mb: 8.5,
            json_output: true,
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.conversion_kind, ConversionKind::Raw);
        assert_eq!(loaded_config.input_root, PathBuf::from("/photos/raw"));
        assert_eq!(loaded_config.optimize_output, Some(PathBuf::from("/photos/jpg")));
        assert_eq!(loaded_config.max_output_size_mb, 8.5);
        assert_eq!(loaded_config.workers, 2);
        assert!(loaded_config.json_output);
    }

    #[tokio::test]
    async fn test_missing_config_file_gives_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.max_output_size_mb, DEFAULT_MAX_OUTPUT_SIZE_MB);
    }
}
