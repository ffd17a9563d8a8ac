//! # Path Resolution Module
//!
//! Mappa ogni file di input sul suo output sotto la root di destinazione,
//! mantenendo la struttura delle directory e cambiando estensione:
//!
//! ```text
//! Input:  /a/b/c.heic   (input root /a)
//! Output: /out/b/c.png  (output root /out)
//! ```
//!
//! Le directory padre vengono create qui, prima che parta qualsiasi worker.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One unit of work: a source file and where its output goes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Centralized output path calculation
pub struct PathResolver;

impl PathResolver {
    /// Output path for `path` without touching the filesystem
    pub fn output_path(
        path: &Path,
        input_root: &Path,
        output_root: &Path,
        new_extension: &str,
    ) -> Result<PathBuf, ConvertError> {
        let relative = path.strip_prefix(input_root).map_err(|_| {
            ConvertError::path(path, format!("not under input root {}", input_root.display()))
        })?;

        if relative.file_name().is_none() {
            return Err(ConvertError::path(path, "no file name below the input root"));
        }

        Ok(output_root.join(relative).with_extension(new_extension))
    }

    /// Build the task for `path`, creating the output parent directory
    pub fn map_to_task(
        path: &Path,
        input_root: &Path,
        output_root: &Path,
        new_extension: &str,
    ) -> Result<Task, ConvertError> {
        let output_path = Self::output_path(path, input_root, output_root, new_extension)?;
        Self::ensure_parent_dirs(&output_path)?;

        debug!("Resolved output path: {} -> {}", path.display(), output_path.display());
        Ok(Task {
            input_path: path.to_path_buf(),
            output_path,
        })
    }

    /// Create the parent directories of `path`; existing ones are fine
    pub fn ensure_parent_dirs(path: &Path) -> Result<(), ConvertError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConvertError::path(parent, format!("cannot create directory: {}", e))
            })?;
        }
        Ok(())
    }
}
