//! Shared test utilities for the shotbook test suite.
//!
//! Synthetic image fixtures are generated through the `image` crate so
//! tests exercise the real decode/encode paths without shipping binary
//! fixtures. Keep dimensions tiny (8×8 unless a test needs otherwise) —
//! encoding dominates test time.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// A small valid JPEG with a deterministic gradient fill.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, 90);
    DynamicImage::ImageRgb8(img).write_with_encoder(encoder).unwrap();
    out.into_inner()
}

/// A small valid RGBA PNG (alpha channel included, to exercise flattening).
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 200])
    });
    let mut out = Cursor::new(Vec::new());
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    out.into_inner()
}

/// Write a synthetic JPEG to `path`, creating parent directories.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, jpeg_bytes(width, height)).unwrap();
}

/// Write a synthetic PNG to `path`, creating parent directories.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, png_bytes(width, height)).unwrap();
}
