//! # Conversion Transforms
//!
//! Trasformazioni HEIC/HEIF e CR2 verso PNG tramite decoder esterni, provati
//! in ordine di preferenza finché uno non riesce.
//!
//! ## Responsabilità:
//! - Risoluzione dei decoder con il [`ToolPathResolver`] ricevuto
//! - Decodifica in una directory temporanea accanto all'output, rimossa con
//!   tutto ciò che il decoder ha scritto (immagini ausiliarie, frame extra)
//! - HEIC: ricodifica PNG in-process con compressione massima
//! - CR2: `-alpha remove -quality 90`, poi spostamento sul path finale
//!
//! `-alpha remove` appiattisce sullo sfondo di default del tool; nessuna
//! composizione su un colore scelto.

use crate::error::ConvertError;
use crate::file_manager::FileManager;
use crate::tool_resolver::{ToolPathResolver, HEIC_DECODERS, RAW_DECODERS};
use crate::transform::{Transform, TransformResult};
use crate::utils::{tool_args, ToolArg};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::ImageEncoder;
use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process::Command;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, error, warn};

/// PNG quality handed to ImageMagick for raw sources
const RAW_PNG_QUALITY: &str = "90";

/// Name of the decoder output inside the scratch directory
const DECODED_FILE_NAME: &str = "decoded.png";

/// HEIC/HEIF to lossless PNG
#[derive(Debug, Clone)]
pub struct HeicToPng {
    decoders: &'static [&'static str],
    resolver: ToolPathResolver,
}

impl Default for HeicToPng {
    fn default() -> Self {
        Self::new(ToolPathResolver::new())
    }
}

impl HeicToPng {
    pub fn new(resolver: ToolPathResolver) -> Self {
        Self {
            decoders: HEIC_DECODERS,
            resolver,
        }
    }

    /// Use a custom decoder preference list
    pub fn with_decoders(mut self, decoders: &'static [&'static str]) -> Self {
        self.decoders = decoders;
        self
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<f64, ConvertError> {
        let scratch = scratch_dir(output)?;
        let decoded = scratch.path().join(DECODED_FILE_NAME);

        run_decoders(&self.resolver, self.decoders, input, &decoded, "HEIC", |_tool, input, output| {
            tool_args([ToolArg::Path(input), ToolArg::Path(output)])
        })?;
        recompress_png(&decoded, output)?;

        FileManager::file_size_mb(output)
    }
}

impl Transform for HeicToPng {
    fn apply(&self, input: &Path, output: &Path) -> TransformResult {
        match self.convert(input, output) {
            Ok(size_mb) => {
                debug!("Converted {} -> {} ({:.2} MB)", input.display(), output.display(), size_mb);
                TransformResult::success_with_size(size_mb)
            }
            Err(e) => {
                warn!("Failed to convert {}: {}", input.display(), e);
                TransformResult::failure()
            }
        }
    }

    fn output_extension(&self) -> &'static str {
        "png"
    }

    fn name(&self) -> &'static str {
        "heic-to-png"
    }
}

/// CR2 raw to PNG with the alpha channel removed
#[derive(Debug, Clone)]
pub struct RawToPng {
    decoders: &'static [&'static str],
    resolver: ToolPathResolver,
}

impl Default for RawToPng {
    fn default() -> Self {
        Self::new(ToolPathResolver::new())
    }
}

impl RawToPng {
    pub fn new(resolver: ToolPathResolver) -> Self {
        Self {
            decoders: RAW_DECODERS,
            resolver,
        }
    }

    /// Use a custom decoder preference list
    pub fn with_decoders(mut self, decoders: &'static [&'static str]) -> Self {
        self.decoders = decoders;
        self
    }

    /// ImageMagick arguments: decode, drop alpha, encode PNG at quality 90
    pub fn decoder_args(input: &Path, output: &Path) -> Vec<OsString> {
        tool_args([
            ToolArg::Path(input),
            ToolArg::Flag("-alpha"),
            ToolArg::Flag("remove"),
            ToolArg::Flag("-quality"),
            ToolArg::Flag(RAW_PNG_QUALITY),
            ToolArg::Path(output),
        ])
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<f64, ConvertError> {
        let scratch = scratch_dir(output)?;
        let decoded = scratch.path().join(DECODED_FILE_NAME);

        run_decoders(&self.resolver, self.decoders, input, &decoded, "CR2", |_tool, input, output| {
            Self::decoder_args(input, output)
        })?;
        // Same directory, so the rename never crosses filesystems
        std::fs::rename(&decoded, output).map_err(|e| ConvertError::encode(output, e))?;

        FileManager::file_size_mb(output)
    }
}

impl Transform for RawToPng {
    fn apply(&self, input: &Path, output: &Path) -> TransformResult {
        match self.convert(input, output) {
            Ok(size_mb) => {
                debug!("Converted {} -> {} ({:.2} MB)", input.display(), output.display(), size_mb);
                TransformResult::success_with_size(size_mb)
            }
            Err(e) => {
                warn!("Failed to convert {}: {}", input.display(), e);
                TransformResult::failure()
            }
        }
    }

    fn output_extension(&self) -> &'static str {
        "png"
    }

    fn name(&self) -> &'static str {
        "raw-to-png"
    }
}

/// Hidden directory next to `output`; dropping it removes every file a
/// decoder wrote there
fn scratch_dir(output: &Path) -> Result<TempDir, ConvertError> {
    let parent = output
        .parent()
        .ok_or_else(|| ConvertError::path(output, "output has no parent directory"))?;

    tempfile::Builder::new()
        .prefix(".decode-")
        .tempdir_in(parent)
        .map_err(|e| ConvertError::path(parent, format!("cannot create scratch directory: {}", e)))
}

/// Try each available decoder in order until one produces `output`.
///
/// Returns `MissingDependency` when none of `decoders` is installed and
/// `Decode` when every installed one failed.
fn run_decoders<F>(
    resolver: &ToolPathResolver,
    decoders: &[&str],
    input: &Path,
    output: &Path,
    format_name: &str,
    args_builder: F,
) -> Result<(), ConvertError>
where
    F: Fn(&str, &Path, &Path) -> Vec<OsString>,
{
    if !input.is_file() {
        return Err(ConvertError::decode(input, "source file does not exist"));
    }

    let mut any_tool_available = false;

    for tool_name in decoders {
        let Some(tool_path) = resolver.resolve_tool(tool_name) else {
            continue;
        };
        any_tool_available = true;

        let args = args_builder(tool_name, input, output);
        debug!("Attempting {} decode with {}: {:?}", format_name, tool_name, args);

        let start_time = Instant::now();
        match Command::new(&tool_path).args(&args).output() {
            Ok(result) if result.status.success() && output.is_file() => {
                debug!("{} decoded with {} in {:?}", format_name, tool_name, start_time.elapsed());
                return Ok(());
            }
            Ok(result) => {
                warn!(
                    "{} decode failed with {} after {:?}: {}",
                    format_name,
                    tool_name,
                    start_time.elapsed(),
                    String::from_utf8_lossy(&result.stderr).trim()
                );
            }
            Err(e) => {
                warn!("Could not run {}: {}", tool_name, e);
            }
        }
    }

    if !any_tool_available {
        error!("No {} decoder available ({})", format_name, decoders.join("/"));
        let hints: Vec<&str> = decoders
            .iter()
            .map(|tool| ToolPathResolver::install_hint(tool))
            .collect();
        Err(ConvertError::MissingDependency(format!(
            "no {} decoder found; install one of {} ({})",
            format_name,
            decoders.join(", "),
            hints.join(" / ")
        )))
    } else {
        Err(ConvertError::decode(
            input,
            format!("all {} decoders failed", format_name),
        ))
    }
}

/// Re-encode a PNG losslessly with the strongest compression settings
pub fn recompress_png(source: &Path, output: &Path) -> Result<(), ConvertError> {
    let img = image::open(source).map_err(|e| ConvertError::decode(source, e))?;

    let file = File::create(output).map_err(|e| ConvertError::encode(output, e))?;
    let encoder = PngEncoder::new_with_quality(
        BufWriter::new(file),
        CompressionType::Best,
        FilterType::Adaptive,
    );
    encoder
        .write_image(img.as_bytes(), img.width(), img.height(), img.color())
        .map_err(|e| ConvertError::encode(output, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    const MISSING: &[&str] = &["definitely-not-a-real-decoder-xyz"];
    const COPYING: &[&str] = &["fake-copy-decoder"];
    const FAILING: &[&str] = &["fake-failing-decoder"];
    const FAILING_THEN_COPYING: &[&str] = &["fake-failing-decoder", "fake-copy-decoder"];
    const COPYING_WITH_AUX: &[&str] = &["fake-aux-decoder"];

    /// Tools directory with shell decoders copying the first argument to the last
    #[cfg(unix)]
    fn fake_tools() -> TempDir {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let scripts = [
            ("fake-copy-decoder", "for last; do :; done\ncp \"$1\" \"$last\""),
            ("fake-failing-decoder", "echo 'cannot decode' >&2\nexit 1"),
            (
                "fake-aux-decoder",
                "for last; do :; done\ncp \"$1\" \"$last\"\ncp \"$1\" \"${last%.png}-depth-1.png\"",
            ),
        ];
        for (name, body) in scripts {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    }

    fn sample_png(path: &Path) -> RgbaImage {
        let img = RgbaImage::from_fn(24, 12, |x, y| Rgba([x as u8 * 10, y as u8 * 20, 77, 255]));
        img.save_with_format(path, image::ImageFormat::Png).unwrap();
        img
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut names: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_raw_decoder_args() {
        let args = RawToPng::decoder_args(Path::new("/in/a.CR2"), Path::new("/out/a.png"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["/in/a.CR2", "-alpha", "remove", "-quality", "90", "/out/a.png"]);
    }

    #[test]
    fn test_missing_decoder_is_a_failed_result() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.heic");
        std::fs::write(&input, b"not really heic").unwrap();

        let result = HeicToPng::default().with_decoders(MISSING).apply(&input, &dir.path().join("a.png"));
        assert_eq!(result, TransformResult::failure());

        let result = RawToPng::default().with_decoders(MISSING).apply(&input, &dir.path().join("b.png"));
        assert!(!result.ok);
    }

    #[test]
    fn test_missing_decoder_error_kind() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.cr2");
        std::fs::write(&input, b"raw").unwrap();

        let err = run_decoders(
            &ToolPathResolver::with_tools_dir(dir.path()),
            MISSING,
            &input,
            &dir.path().join("a.png"),
            "CR2",
            |_, i, o| tool_args([ToolArg::Path(i), ToolArg::Path(o)]),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::MissingDependency(_)));
    }

    #[test]
    fn test_missing_source_is_a_failed_result() {
        let dir = TempDir::new().unwrap();
        let result = HeicToPng::default().apply(&dir.path().join("absent.heic"), &dir.path().join("absent.png"));
        assert!(!result.ok);
        assert!(!dir.path().join("absent.png").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_heic_conversion_succeeds() {
        let tools = fake_tools();
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("IMG_0001.heic");
        let out_dir = dir.path().join("png");
        std::fs::create_dir_all(&out_dir).unwrap();
        let output = out_dir.join("IMG_0001.png");
        let img = sample_png(&input);

        let transform = HeicToPng::new(ToolPathResolver::with_tools_dir(tools.path())).with_decoders(COPYING);
        let result = transform.apply(&input, &output);

        assert!(result.ok);
        assert!(result.size_mb.unwrap() > 0.0);
        assert_eq!(image::open(&output).unwrap().to_rgba8().as_raw(), img.as_raw());
        assert_eq!(entries(&out_dir), vec![output]);
    }

    #[cfg(unix)]
    #[test]
    fn test_decoder_fallback_after_failure() {
        let tools = fake_tools();
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.heic");
        let output = dir.path().join("a.png");
        sample_png(&input);

        let transform =
            HeicToPng::new(ToolPathResolver::with_tools_dir(tools.path())).with_decoders(FAILING_THEN_COPYING);
        assert!(transform.apply(&input, &output).ok);
        assert!(output.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_all_decoders_failing_is_decode_error() {
        let tools = fake_tools();
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.cr2");
        std::fs::write(&input, b"raw").unwrap();

        let err = run_decoders(
            &ToolPathResolver::with_tools_dir(tools.path()),
            FAILING,
            &input,
            &dir.path().join("a.png"),
            "CR2",
            |_, i, o| RawToPng::decoder_args(i, o),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_raw_conversion_moves_decoded_file() {
        let tools = fake_tools();
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("IMG_0002.CR2");
        let out_dir = dir.path().join("png");
        std::fs::create_dir_all(&out_dir).unwrap();
        let output = out_dir.join("IMG_0002.png");
        sample_png(&input);

        let transform = RawToPng::new(ToolPathResolver::with_tools_dir(tools.path())).with_decoders(COPYING);
        let result = transform.apply(&input, &output);

        assert!(result.ok);
        assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());
        assert_eq!(entries(&out_dir), vec![output]);
    }

    #[cfg(unix)]
    #[test]
    fn test_auxiliary_decoder_outputs_are_removed() {
        let tools = fake_tools();
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("portrait.heic");
        let out_dir = dir.path().join("png");
        std::fs::create_dir_all(&out_dir).unwrap();
        let output = out_dir.join("portrait.png");
        sample_png(&input);

        let transform =
            HeicToPng::new(ToolPathResolver::with_tools_dir(tools.path())).with_decoders(COPYING_WITH_AUX);
        assert!(transform.apply(&input, &output).ok);
        assert_eq!(entries(&out_dir), vec![output]);
    }

    #[cfg(unix)]
    #[test]
    fn test_garbage_source_leaves_nothing_behind() {
        let tools = fake_tools();
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("broken.HEIC");
        let out_dir = dir.path().join("png");
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(&input, b"definitely not an image").unwrap();

        let transform = HeicToPng::new(ToolPathResolver::with_tools_dir(tools.path())).with_decoders(COPYING);
        let result = transform.apply(&input, &out_dir.join("broken.png"));

        assert_eq!(result, TransformResult::failure());
        assert!(entries(&out_dir).is_empty());
    }

    #[test]
    fn test_recompress_png_is_lossless() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.png");
        let output = dir.path().join("output.png");

        let img = RgbaImage::from_fn(32, 16, |x, y| Rgba([x as u8 * 8, y as u8 * 16, 128, (x + y) as u8 * 4]));
        img.save(&source).unwrap();

        recompress_png(&source, &output).unwrap();

        let reloaded = image::open(&output).unwrap().to_rgba8();
        assert_eq!(reloaded.dimensions(), (32, 16));
        assert_eq!(reloaded.as_raw(), img.as_raw());
    }

    #[test]
    fn test_recompress_png_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.png");
        std::fs::write(&source, b"definitely not a png").unwrap();

        let err = recompress_png(&source, &dir.path().join("out.png")).unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }
}
