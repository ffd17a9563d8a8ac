//! # PNG to size-capped JPEG
//!
//! ## Pipeline per ogni file:
//! 1. decodifica del PNG
//! 2. conversione a RGB 8 bit (l'alpha viene scartato, non composto)
//! 3. ridimensionamento Lanczos3 se un lato supera 4000 px
//! 4. ricerca della qualità: 90, 85, ... 30, si tiene la prima codifica
//!    sotto il limite; quella a 30 viene tenuta comunque
//!
//! Lo schedule è finito: al massimo [`MAX_ATTEMPTS`] codifiche.

use crate::error::ConvertError;
use crate::file_manager::FileManager;
use crate::transform::{Transform, TransformResult};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageEncoder, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Longest side allowed before downscaling
pub const MAX_DIMENSION: u32 = 4000;

/// First quality tried by the size search
pub const START_QUALITY: u8 = 90;

/// Quality decrement between attempts
pub const QUALITY_STEP: u8 = 5;

/// Lowest quality tried; its encoding is accepted unconditionally
pub const QUALITY_FLOOR: u8 = 30;

/// Upper bound on encodes per file
pub const MAX_ATTEMPTS: usize = ((START_QUALITY - QUALITY_FLOOR) / QUALITY_STEP) as usize + 1;

/// PNG to JPEG re-encoding under a size cap
#[derive(Debug, Clone)]
pub struct PngToJpeg {
    max_size_mb: f64,
}

/// Result of the size search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeSearchOutcome {
    /// Quality of the accepted encoding
    pub quality: u8,
    pub size_mb: f64,
    /// Number of encodes performed
    pub attempts: usize,
    /// Whether the accepted encoding is within the cap
    pub within_limit: bool,
}

impl PngToJpeg {
    pub fn new(max_size_mb: f64) -> Self {
        Self { max_size_mb }
    }

    fn optimize(&self, input: &Path, output: &Path) -> Result<SizeSearchOutcome, ConvertError> {
        let img = image::open(input).map_err(|e| ConvertError::decode(input, e))?;
        let rgb = downscale(flatten_to_rgb(img), MAX_DIMENSION);

        search_quality(self.max_size_mb, |quality| encode_jpeg(&rgb, output, quality))
    }
}

impl Transform for PngToJpeg {
    fn apply(&self, input: &Path, output: &Path) -> TransformResult {
        match self.optimize(input, output) {
            Ok(outcome) => {
                if outcome.within_limit {
                    debug!(
                        "Optimized {} at quality {} ({:.2} MB, {} attempts)",
                        input.display(),
                        outcome.quality,
                        outcome.size_mb,
                        outcome.attempts
                    );
                } else {
                    warn!(
                        "{} still {:.2} MB at quality floor {} (cap {:.2} MB)",
                        input.display(),
                        outcome.size_mb,
                        outcome.quality,
                        self.max_size_mb
                    );
                }
                TransformResult::success_with_size(outcome.size_mb)
            }
            Err(e) => {
                warn!("Failed to optimize {}: {}", input.display(), e);
                TransformResult::failure()
            }
        }
    }

    fn output_extension(&self) -> &'static str {
        "jpg"
    }

    fn name(&self) -> &'static str {
        "png-to-jpeg"
    }
}

/// Qualities tried by the size search, highest first
pub fn quality_schedule() -> impl Iterator<Item = u8> {
    (QUALITY_FLOOR..=START_QUALITY)
        .rev()
        .step_by(QUALITY_STEP as usize)
}

/// Run the size search. `encode` writes the output at the given quality and
/// returns its size in MB.
pub fn search_quality<F>(max_size_mb: f64, mut encode: F) -> Result<SizeSearchOutcome, ConvertError>
where
    F: FnMut(u8) -> Result<f64, ConvertError>,
{
    let mut attempts = 0;

    for quality in quality_schedule() {
        attempts += 1;
        let size_mb = encode(quality)?;
        let within_limit = size_mb <= max_size_mb;

        if within_limit || quality <= QUALITY_FLOOR {
            return Ok(SizeSearchOutcome {
                quality,
                size_mb,
                attempts,
                within_limit,
            });
        }
        debug!("Quality {} gives {:.2} MB (cap {:.2} MB), lowering", quality, size_mb, max_size_mb);
    }

    Err(ConvertError::Validation("empty quality schedule".to_string()))
}

/// Convert to 8-bit RGB. Alpha is dropped, not blended.
pub fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

/// Target size when a side exceeds `max_dimension`: the longer side becomes
/// `max_dimension`, the shorter one is scaled and rounded.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if width <= max_dimension && height <= max_dimension {
        return None;
    }

    let scale = |short: u32, long: u32| -> u32 {
        ((short as f64 * max_dimension as f64 / long as f64).round() as u32).max(1)
    };

    if width > height {
        Some((max_dimension, scale(height, width)))
    } else {
        Some((scale(width, height), max_dimension))
    }
}

/// Downscale with Lanczos3 when a side exceeds `max_dimension`
pub fn downscale(img: RgbImage, max_dimension: u32) -> RgbImage {
    match scaled_dimensions(img.width(), img.height(), max_dimension) {
        Some((width, height)) => {
            debug!("Resizing {}x{} -> {}x{}", img.width(), img.height(), width, height);
            image::imageops::resize(&img, width, height, FilterType::Lanczos3)
        }
        None => img,
    }
}

/// Encode `img` to `output` at `quality`, returning the file size in MB
pub fn encode_jpeg(img: &RgbImage, output: &Path, quality: u8) -> Result<f64, ConvertError> {
    let file = File::create(output).map_err(|e| ConvertError::encode(output, e))?;
    let mut writer = BufWriter::new(file);

    JpegEncoder::new_with_quality(&mut writer, quality)
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)
        .map_err(|e| ConvertError::encode(output, e))?;
    writer.flush().map_err(|e| ConvertError::encode(output, e))?;
    drop(writer);

    FileManager::file_size_mb(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn noisy_rgb(width: u32, height: u32) -> RgbImage {
        let mut state: u32 = 0x1234_5678;
        RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        })
    }

    #[test]
    fn test_quality_schedule() {
        let schedule: Vec<u8> = quality_schedule().collect();
        assert_eq!(schedule.first(), Some(&90));
        assert_eq!(schedule.last(), Some(&30));
        assert_eq!(schedule.len(), 13);
        assert_eq!(MAX_ATTEMPTS, 13);
    }

    #[test]
    fn test_single_attempt_when_first_encoding_fits() {
        let mut calls = Vec::new();
        let outcome = search_quality(15.0, |q| {
            calls.push(q);
            Ok(4.0)
        })
        .unwrap();

        assert_eq!(calls, vec![90]);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.quality, 90);
        assert!(outcome.within_limit);
    }

    #[test]
    fn test_search_stops_at_first_fitting_quality() {
        // 20 MB at 90, shrinking 2 MB per step: 90, 85, 80 -> 16, 75 -> 14
        let outcome = search_quality(15.0, |q| Ok(20.0 - (90 - q as u32) as f64 * 0.4)).unwrap();
        assert_eq!(outcome.quality, 75);
        assert_eq!(outcome.attempts, 4);
        assert!(outcome.size_mb <= 15.0);
    }

    #[test]
    fn test_search_accepts_floor_when_never_fitting() {
        let mut calls = 0;
        let outcome = search_quality(1.0, |_| {
            calls += 1;
            Ok(50.0)
        })
        .unwrap();

        assert_eq!(calls, MAX_ATTEMPTS);
        assert_eq!(outcome.quality, QUALITY_FLOOR);
        assert_eq!(outcome.size_mb, 50.0);
        assert!(!outcome.within_limit);
    }

    #[test]
    fn test_search_propagates_encode_error() {
        let result = search_quality(1.0, |_| Err(ConvertError::encode(Path::new("/out/x.jpg"), "disk full")));
        assert!(matches!(result, Err(ConvertError::Encode { .. })));
    }

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(6000, 4000, 4000), Some((4000, 2667)));
        assert_eq!(scaled_dimensions(4000, 6000, 4000), Some((2667, 4000)));
        assert_eq!(scaled_dimensions(5000, 5000, 4000), Some((4000, 4000)));
        assert_eq!(scaled_dimensions(4000, 3000, 4000), None);
        assert_eq!(scaled_dimensions(100, 80, 4000), None);
    }

    #[test]
    fn test_downscale_preserves_aspect_ratio() {
        let img = noisy_rgb(60, 40);
        let resized = downscale(img, 40);
        assert_eq!(resized.dimensions(), (40, 27));

        let untouched = downscale(noisy_rgb(30, 20), 40);
        assert_eq!(untouched.dimensions(), (30, 20));
    }

    #[test]
    fn test_flatten_drops_alpha() {
        let rgba = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 0]));
        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_encode_jpeg_lower_quality_is_smaller() {
        let dir = TempDir::new().unwrap();
        let img = noisy_rgb(128, 128);
        let high = encode_jpeg(&img, &dir.path().join("high.jpg"), 90).unwrap();
        let low = encode_jpeg(&img, &dir.path().join("low.jpg"), 30).unwrap();
        assert!(low < high);
    }

    #[test]
    fn test_apply_writes_rgb_jpeg() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("alpha.png");
        let output = dir.path().join("alpha.jpg");
        RgbaImage::from_pixel(48, 32, Rgba([200, 100, 50, 90])).save(&input).unwrap();

        let result = PngToJpeg::new(15.0).apply(&input, &output);

        assert!(result.ok);
        assert!(result.size_mb.unwrap() > 0.0);
        let decoded = image::open(&output).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), (48, 32));
    }

    #[test]
    fn test_apply_accepts_floor_for_tiny_cap() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("noise.png");
        let output = dir.path().join("noise.jpg");
        noisy_rgb(96, 96).save(&input).unwrap();

        let result = PngToJpeg::new(0.000_001).apply(&input, &output);
        assert!(result.ok);
        assert!(output.exists());
    }

    #[test]
    fn test_apply_corrupt_input_fails() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("corrupt.png");
        std::fs::write(&input, b"\x89PNG but not really").unwrap();

        let result = PngToJpeg::new(15.0).apply(&input, &dir.path().join("corrupt.jpg"));
        assert_eq!(result, TransformResult::failure());
    }
}
