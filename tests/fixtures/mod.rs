//! Fixture images and source geometry for harness tests

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Source image name the stock service ships with
pub const SOURCE_IMAGE: &str = "test_card_sml.png";

/// Native size the stub service pretends the source image has
pub const SOURCE_WIDTH: u32 = 400;
pub const SOURCE_HEIGHT: u32 = 400;

/// Deterministic test-card-like pattern so equal sizes always encode to equal bytes.
pub fn test_card(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let band = (x * 8 / width.max(1)) as u8;
        Rgb([band.wrapping_mul(32), (y % 256) as u8, 128])
    })
}

pub fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("Failed to encode fixture image");
    buf
}

pub fn png_card(width: u32, height: u32) -> Vec<u8> {
    encode(test_card(width, height), ImageFormat::Png)
}

pub fn jpeg_card(width: u32, height: u32) -> Vec<u8> {
    encode(test_card(width, height), ImageFormat::Jpeg)
}

/// Same geometry as [`png_card`] but visibly different content.
pub fn png_card_inverted(width: u32, height: u32) -> Vec<u8> {
    let mut img = test_card(width, height);
    image::imageops::invert(&mut img);
    encode(img, ImageFormat::Png)
}

/// Size an aspect-preserving service returns for a single-axis request.
pub fn proportional_size(width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (w * SOURCE_HEIGHT / SOURCE_WIDTH).max(1)),
        (None, Some(h)) => ((h * SOURCE_WIDTH / SOURCE_HEIGHT).max(1), h),
        (None, None) => (SOURCE_WIDTH, SOURCE_HEIGHT),
    }
}
