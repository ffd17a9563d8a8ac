//! # Error Types Module
//!
//! Tipi di errore della libreria, definiti con `thiserror`.
//!
//! ## Categorie:
//! - `Decode`: sorgente illeggibile, corrotta o in un sottoformato non supportato
//! - `Encode`: output non scrivibile o non codificabile
//! - `Path`: path fuori dalla root attesa, mancante o non valido
//! - `MissingDependency`: nessun decoder esterno disponibile
//! - `Validation`: configurazione non valida
//!
//! Gli errori per singolo file restano dentro la trasformazione che li produce
//! e diventano un `TransformResult` fallito. Solo gli errori di setup arrivano
//! al chiamante.

use std::path::{Path, PathBuf};

/// Custom error types for batch conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Cannot encode {}: {message}", .path.display())]
    Encode { path: PathBuf, message: String },

    #[error("Invalid path {}: {message}", .path.display())]
    Path { path: PathBuf, message: String },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Configuration error: {0}")]
    Validation(String),
}

impl ConvertError {
    pub fn decode(path: &Path, message: impl ToString) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn encode(path: &Path, message: impl ToString) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn path(path: &Path, message: impl ToString) -> Self {
        Self::Path {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}
