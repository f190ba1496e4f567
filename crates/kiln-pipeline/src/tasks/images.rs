//! Image compression and copying.
//!
//! Development copies images through untouched. Production re-encodes JPEG
//! and PNG, strips SVG comments and inter-tag whitespace, and keeps the
//! original bytes whenever re-encoding does not make the file smaller.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use regex::Regex;

use super::{run_files, write_output, Outcome, TaskContext, TaskError, TaskReport};
use crate::layout::AssetClass;

const IMAGE_CACHE: &str = "images";

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn reencode(bytes: &[u8], format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>, TaskError> {
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| TaskError::Image(e.to_string()))?;
    let mut out = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| TaskError::Image(e.to_string()))?;
        }
        _ => {
            let encoder =
                PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
            img.write_with_encoder(encoder)
                .map_err(|e| TaskError::Image(e.to_string()))?;
        }
    }

    Ok(out.into_inner())
}

/// Strip comments and whitespace between tags from SVG markup.
pub fn minify_svg(svg: &str) -> String {
    static COMMENTS: OnceLock<Regex> = OnceLock::new();
    static BETWEEN_TAGS: OnceLock<Regex> = OnceLock::new();

    let comments = COMMENTS.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
    let between = BETWEEN_TAGS.get_or_init(|| Regex::new(r">\s+<").expect("valid regex"));

    let without_comments = comments.replace_all(svg, "");
    between
        .replace_all(&without_comments, "><")
        .trim()
        .to_string()
}

/// Compress one image, falling back to the original when nothing is gained.
pub fn optimize(path: &Path, bytes: &[u8], jpeg_quality: u8) -> Result<Vec<u8>, TaskError> {
    let optimized = match extension(path).as_str() {
        "jpg" | "jpeg" => reencode(bytes, ImageFormat::Jpeg, jpeg_quality)?,
        "png" => reencode(bytes, ImageFormat::Png, jpeg_quality)?,
        "svg" => {
            let text = std::str::from_utf8(bytes).map_err(|e| TaskError::Image(e.to_string()))?;
            minify_svg(text).into_bytes()
        }
        _ => return Ok(bytes.to_vec()),
    };

    if optimized.len() < bytes.len() {
        Ok(optimized)
    } else {
        Ok(bytes.to_vec())
    }
}

/// Write the output for one image unless it is unchanged since the last run.
fn process(ctx: &TaskContext<'_>, source: &Path, raw: bool) -> Result<Outcome, TaskError> {
    let dest = ctx
        .layout
        .destination(AssetClass::Images, source)
        .ok_or_else(|| TaskError::NoDestination(source.to_path_buf()))?;

    let bytes = fs::read(source)?;
    if !ctx.cache.changed(IMAGE_CACHE, source, &bytes) && dest.exists() {
        return Ok(Outcome::Skipped);
    }

    // A failed source must fail again on the next run, not look unchanged
    let written = transform(ctx, source, bytes, raw).and_then(|output| write_output(&dest, output));
    if written.is_err() {
        ctx.cache.forget(IMAGE_CACHE, source);
    }
    written.map(|()| Outcome::Written)
}

fn transform(
    ctx: &TaskContext<'_>,
    source: &Path,
    bytes: Vec<u8>,
    raw: bool,
) -> Result<Vec<u8>, TaskError> {
    if !ctx.mode.is_production() {
        Ok(bytes)
    } else if raw {
        compress_raw(ctx, source, bytes)
    } else {
        optimize(source, &bytes, ctx.config.images.jpeg_quality)
    }
}

/// Compress a raw PNG through TinyPNG when it is enabled, locally otherwise.
#[cfg(feature = "tinypng")]
fn compress_raw(ctx: &TaskContext<'_>, source: &Path, bytes: Vec<u8>) -> Result<Vec<u8>, TaskError> {
    let Some(key) = ctx.config.tinypng.active_key() else {
        return optimize(source, &bytes, ctx.config.images.jpeg_quality);
    };

    match super::tinypng::shrink(&key, &bytes) {
        Ok(shrunk) => Ok(shrunk),
        Err(e) => {
            ctx.notifier.report("tinypng", source, &e);
            Ok(bytes)
        }
    }
}

#[cfg(not(feature = "tinypng"))]
fn compress_raw(ctx: &TaskContext<'_>, source: &Path, bytes: Vec<u8>) -> Result<Vec<u8>, TaskError> {
    if ctx.config.tinypng.active_key().is_some() {
        ctx.notifier.warn(
            "tinypng",
            source,
            "TinyPNG is enabled but kiln was built without the `tinypng` feature",
        );
    }
    optimize(source, &bytes, ctx.config.images.jpeg_quality)
}

/// Compress or copy every image, raw PNG sources included.
pub fn compress(ctx: &TaskContext<'_>) -> TaskReport {
    let images = ctx.layout.sources(AssetClass::Images);
    let raw = ctx.layout.raw_images();

    let mut report = run_files("images", &images, ctx.notifier, |source| {
        process(ctx, source, false)
    });
    let raw_report = run_files("images", &raw, ctx.notifier, |source| {
        process(ctx, source, true)
    });

    report.absorb(&raw_report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TINYPNG_KEY_ENV_VAR;
    use crate::tasks::testing::{env_lock, write, Fixture};
    use crate::BuildMode;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    /// A smooth gradient PNG written with the fastest compression.
    fn sample_png() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, _| Rgb([(x * 4) as u8, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        let encoder =
            PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter);
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(encoder)
            .unwrap();
        out.into_inner()
    }

    const SVG: &str = "<svg>\n  <!-- icon -->\n  <path d=\"M0 0\"/>\n</svg>\n";

    #[test]
    fn minifies_svg() {
        assert_eq!(minify_svg(SVG), "<svg><path d=\"M0 0\"/></svg>");
    }

    #[test]
    fn never_grows_an_image() {
        let original = b"GIF89a-not-really".to_vec();
        let out = optimize(Path::new("a.gif"), &original, 80).unwrap();
        assert_eq!(out, original);

        let png = sample_png();
        let out = optimize(Path::new("a.png"), &png, 80).unwrap();
        assert!(out.len() <= png.len());
    }

    #[test]
    fn development_copies_bytes_verbatim() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(&root.join("src/img/icons/a.svg"), SVG);

        let fixture = Fixture::new(root);
        let report = compress(&fixture.context(BuildMode::Development));

        assert_eq!(report.written, 1);
        assert_eq!(
            fs::read_to_string(root.join("dist/assets/img/icons/a.svg")).unwrap(),
            SVG
        );
    }

    #[test]
    fn production_compresses() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(&root.join("src/img/a.svg"), SVG);
        write(&root.join("src/imgraw/b.png"), sample_png());

        let fixture = Fixture::new(root);
        let report = compress(&fixture.context(BuildMode::Production));

        assert_eq!(report.written, 2);
        assert_eq!(
            fs::read_to_string(root.join("dist/assets/img/a.svg")).unwrap(),
            "<svg><path d=\"M0 0\"/></svg>"
        );
        assert!(root.join("dist/assets/img/b.png").exists());
    }

    #[test]
    fn unchanged_images_are_skipped_on_rerun() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(&root.join("src/img/a.svg"), SVG);

        let fixture = Fixture::new(root);
        let ctx = fixture.context(BuildMode::Development);

        assert_eq!(compress(&ctx).written, 1);
        let rerun = compress(&ctx);
        assert_eq!(rerun.written, 0);
        assert_eq!(rerun.skipped, 1);
    }

    #[test]
    fn corrupt_image_is_reported() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(&root.join("src/img/broken.jpg"), b"not a jpeg");

        let fixture = Fixture::new(root);
        let report = compress(&fixture.context(BuildMode::Production));

        assert_eq!(report.failed, 1);
        assert_eq!(fixture.notifier.failures(), 1);
    }

    #[test]
    fn corrupt_image_keeps_failing_on_rerun() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let source = root.join("src/img/a.png");
        write(&source, sample_png());

        let fixture = Fixture::new(root);
        let ctx = fixture.context(BuildMode::Production);
        assert_eq!(compress(&ctx).written, 1);

        fs::write(&source, b"not a png").unwrap();
        let broken = compress(&ctx);
        assert_eq!(broken.failed, 1);

        let rerun = compress(&ctx);
        assert_eq!(rerun.failed, 1);
        assert_eq!(rerun.skipped, 0);
        assert_eq!(fixture.notifier.failures(), 2);
    }

    #[test]
    fn development_never_compresses_raw_pngs() {
        let _env = env_lock();
        std::env::set_var(TINYPNG_KEY_ENV_VAR, "secret");

        let temp = tempdir().unwrap();
        let root = temp.path();
        let png = sample_png();
        write(&root.join("src/imgraw/b.png"), &png);

        let mut fixture = Fixture::new(root);
        fixture.config.tinypng.enabled = true;
        let report = compress(&fixture.context(BuildMode::Development));

        std::env::remove_var(TINYPNG_KEY_ENV_VAR);
        assert_eq!(report.written, 1);
        assert_eq!(fs::read(root.join("dist/assets/img/b.png")).unwrap(), png);
        assert_eq!(fixture.notifier.failures(), 0);
    }

    #[cfg(not(feature = "tinypng"))]
    #[test]
    fn production_falls_back_to_local_compression_without_the_feature() {
        let _env = env_lock();
        std::env::set_var(TINYPNG_KEY_ENV_VAR, "secret");

        let temp = tempdir().unwrap();
        let root = temp.path();
        let png = sample_png();
        write(&root.join("src/imgraw/b.png"), &png);

        let mut fixture = Fixture::new(root);
        fixture.config.tinypng.enabled = true;
        let report = compress(&fixture.context(BuildMode::Production));

        std::env::remove_var(TINYPNG_KEY_ENV_VAR);
        assert_eq!(report.written, 1);
        let out = fs::read(root.join("dist/assets/img/b.png")).unwrap();
        assert!(out.len() < png.len());
        assert_eq!(fixture.notifier.failures(), 0);
    }
}
