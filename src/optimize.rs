//! Pure image optimization — bytes in, bytes out.
//!
//! The optimizer never touches the filesystem: it decodes a source buffer,
//! resizes it to fit within a configurable box (never upscaling a smaller
//! source), and re-encodes at a configurable quality. The caller persists
//! the result and does all bookkeeping, which keeps this module testable
//! with nothing but in-memory buffers.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::DynamicImage::resize` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (best compression) |
//! | Encode → WebP | `webp` crate (the `image` crate's WebP encoder is lossless-only) |
//!
//! A decode or encode failure is terminal for the image, not for the batch:
//! callers record the filename as unprocessed and continue.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType as PngCompression, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Quality setting for lossy encoding (1-100). Clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Encodable output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension used for derived artifacts.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// Map a raw file extension to the format it implies, if encodable.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "webp" => Some(OutputFormat::Webp),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::WebP => Some(OutputFormat::Webp),
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::Png => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

/// Everything the optimizer needs to know about one transform.
#[derive(Debug, Clone)]
pub struct OptimizeSettings {
    /// Fit-within box. Sources already inside the box are never upscaled.
    pub max_width: u32,
    pub max_height: u32,
    pub quality: Quality,
    /// Target encoding, unless `preserve_format` overrides it.
    pub format: OutputFormat,
    /// Encode to the source's own detected format instead of `format`.
    pub preserve_format: bool,
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            quality: Quality::default(),
            format: OutputFormat::Webp,
            preserve_format: false,
        }
    }
}

/// A successfully optimized image.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    /// Format the result was encoded in.
    pub format: OutputFormat,
    /// Format the source was decoded from.
    pub source_format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl OptimizedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Detect the source format from magic bytes.
pub fn detect_format(bytes: &[u8]) -> Result<OutputFormat, OptimizeError> {
    let format = image::guess_format(bytes)
        .map_err(|e| OptimizeError::UnsupportedFormat(e.to_string()))?;
    OutputFormat::from_image_format(format)
        .ok_or_else(|| OptimizeError::UnsupportedFormat(format!("{format:?}")))
}

/// Resize and re-encode a source image buffer.
///
/// The source is resized to fit within `max_width` × `max_height` while
/// preserving aspect ratio; a source already inside the box passes through
/// at its original dimensions. Output format is `settings.format`, or the
/// source's detected format when `preserve_format` is set.
pub fn optimize(bytes: &[u8], settings: &OptimizeSettings) -> Result<OptimizedImage, OptimizeError> {
    let source_format = detect_format(bytes)?;

    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| OptimizeError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| OptimizeError::Decode(e.to_string()))?;

    let (orig_w, orig_h) = img.dimensions();
    let resized = if orig_w > settings.max_width || orig_h > settings.max_height {
        img.resize(settings.max_width, settings.max_height, FilterType::Lanczos3)
    } else {
        img
    };
    let (width, height) = resized.dimensions();

    let format = if settings.preserve_format {
        source_format
    } else {
        settings.format
    };

    let bytes = encode(&resized, format, settings.quality)?;

    Ok(OptimizedImage {
        bytes,
        format,
        source_format,
        width,
        height,
    })
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: Quality) -> Result<Vec<u8>, OptimizeError> {
    match format {
        OutputFormat::Webp => encode_webp(img, quality),
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::Png => encode_png(img),
    }
}

/// Lossy WebP through the `webp` crate, which only accepts RGB8/RGBA8.
fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, OptimizeError> {
    let rgba;
    let img = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other => {
            rgba = DynamicImage::ImageRgba8(other.to_rgba8());
            &rgba
        }
    };
    let encoder =
        webp::Encoder::from_image(img).map_err(|e| OptimizeError::Encode(e.to_string()))?;
    Ok(encoder.encode(quality.value() as f32).to_vec())
}

/// JPEG has no alpha channel, so flatten to RGB first.
fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, OptimizeError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.value() as u8);
    rgb.write_with_encoder(encoder)
        .map_err(|e| OptimizeError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// PNG is lossless; encode at maximum compression instead of a quality level.
fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, OptimizeError> {
    let mut out = Cursor::new(Vec::new());
    let encoder = PngEncoder::new_with_quality(&mut out, PngCompression::Best, PngFilter::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| OptimizeError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
