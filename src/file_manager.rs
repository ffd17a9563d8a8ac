//! # File Management Module
//!
//! Ricerca dei file sorgente e piccole utility sulle dimensioni.
//!
//! ## Responsabilità:
//! - `find_files()`: walk ricorsivo lazy che restituisce path assoluti con
//!   estensione nell'insieme dato (case-sensitive)
//! - `file_size_mb()`: dimensione di un file in MB
//! - `total_size_mb()`: somma delle dimensioni, i file mancanti valgono zero
//! - `calculate_reduction()`: percentuale di riduzione tra due dimensioni

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Walk `root` recursively and yield the files whose extension is in
    /// `extensions`. The walk is sorted by file name so one run always sees
    /// the same order; calling again restarts it.
    pub fn find_files<'a>(
        root: &Path,
        extensions: &'a [&'a str],
    ) -> Result<impl Iterator<Item = PathBuf> + 'a, ConvertError> {
        if !root.is_dir() {
            return Err(ConvertError::path(root, "not an existing directory"));
        }
        let root = root
            .canonicalize()
            .map_err(|e| ConvertError::path(root, e))?;

        Ok(WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(move |e| Self::has_extension(e.path(), extensions))
            .map(|e| e.into_path()))
    }

    /// Case-sensitive extension check
    pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.contains(&ext))
            .unwrap_or(false)
    }

    /// Size of a file in MB
    pub fn file_size_mb(path: &Path) -> Result<f64, ConvertError> {
        Ok(std::fs::metadata(path)?.len() as f64 / BYTES_PER_MB)
    }

    /// Combined size of `paths` in MB; unreadable files count as zero
    pub fn total_size_mb(paths: &[PathBuf]) -> f64 {
        paths
            .iter()
            .map(|path| Self::file_size_mb(path).unwrap_or(0.0))
            .sum()
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original: f64, new: f64) -> f64 {
        if original <= 0.0 {
            0.0
        } else {
            (original - new) / original * 100.0
        }
    }
}
