//! # Transform Module
//!
//! Trasformazioni file-to-file eseguite dal worker pool. Ognuna legge
//! `input`, scrive `output` e riporta l'esito come [`TransformResult`]; gli
//! errori non escono mai da `apply`.
//!
//! ## Varianti:
//! - `HeicToPng`: HEIC/HEIF decodificato da un tool esterno, PNG compresso
//! - `RawToPng`: CR2 decodificato da ImageMagick, alpha rimosso, qualità 90
//! - `PngToJpeg`: PNG ricodificato in JPEG entro una dimensione massima
//!
//! [`TransformKind`] è l'insieme chiuso delle varianti scelto a runtime.

pub mod convert;
pub mod optimize;

pub use convert::{HeicToPng, RawToPng};
pub use optimize::PngToJpeg;

use crate::config::ConversionKind;
use crate::tool_resolver::ToolPathResolver;
use serde::Serialize;
use std::path::Path;

/// Outcome of one transform invocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransformResult {
    pub ok: bool,
    /// Output size in MB, when the transform measured it
    pub size_mb: Option<f64>,
}

impl TransformResult {
    pub fn success() -> Self {
        Self {
            ok: true,
            size_mb: None,
        }
    }

    pub fn success_with_size(size_mb: f64) -> Self {
        Self {
            ok: true,
            size_mb: Some(size_mb),
        }
    }

    pub fn failure() -> Self {
        Self {
            ok: false,
            size_mb: None,
        }
    }
}

/// A file-to-file conversion executed on a blocking worker thread
pub trait Transform: Send + Sync {
    /// Convert `input` into `output`. Must not panic on bad input.
    fn apply(&self, input: &Path, output: &Path) -> TransformResult;

    /// Extension given to output files, without the dot
    fn output_extension(&self) -> &'static str;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Closed set of transforms known to the batch engine
#[derive(Debug, Clone)]
pub enum TransformKind {
    HeicToPng(HeicToPng),
    RawToPng(RawToPng),
    PngToJpeg(PngToJpeg),
}

impl TransformKind {
    /// Conversion transform for a source family, decoding with tools found
    /// by `resolver`
    pub fn for_conversion(kind: ConversionKind, resolver: ToolPathResolver) -> Self {
        match kind {
            ConversionKind::Heic => TransformKind::HeicToPng(HeicToPng::new(resolver)),
            ConversionKind::Raw => TransformKind::RawToPng(RawToPng::new(resolver)),
        }
    }

    /// Size-capped JPEG optimization transform
    pub fn optimization(max_size_mb: f64) -> Self {
        TransformKind::PngToJpeg(PngToJpeg::new(max_size_mb))
    }
}

impl Transform for TransformKind {
    fn apply(&self, input: &Path, output: &Path) -> TransformResult {
        match self {
            TransformKind::HeicToPng(t) => t.apply(input, output),
            TransformKind::RawToPng(t) => t.apply(input, output),
            TransformKind::PngToJpeg(t) => t.apply(input, output),
        }
    }

    fn output_extension(&self) -> &'static str {
        match self {
            TransformKind::HeicToPng(t) => t.output_extension(),
            TransformKind::RawToPng(t) => t.output_extension(),
            TransformKind::PngToJpeg(t) => t.output_extension(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TransformKind::HeicToPng(t) => t.name(),
            TransformKind::RawToPng(t) => t.name(),
            TransformKind::PngToJpeg(t) => t.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_selection() {
        let heic = TransformKind::for_conversion(ConversionKind::Heic, ToolPathResolver::new());
        assert!(matches!(heic, TransformKind::HeicToPng(_)));
        assert_eq!(heic.output_extension(), "png");

        let raw = TransformKind::for_conversion(ConversionKind::Raw, ToolPathResolver::new());
        assert!(matches!(raw, TransformKind::RawToPng(_)));
        assert_eq!(raw.output_extension(), "png");

        let jpeg = TransformKind::optimization(15.0);
        assert_eq!(jpeg.output_extension(), "jpg");
        assert_eq!(jpeg.name(), "png-to-jpeg");
    }

    #[test]
    fn test_result_constructors() {
        assert!(TransformResult::success().ok);
        assert_eq!(TransformResult::success_with_size(2.5).size_mb, Some(2.5));
        assert_eq!(TransformResult::failure(), TransformResult { ok: false, size_mb: None });
    }
}
