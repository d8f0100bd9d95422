#![allow(dead_code)]

use std::{fs, io::Cursor, path::Path};

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, codecs::jpeg::JpegEncoder};

fn mix(x: u32, y: u32, seed: u32) -> u8 {
    let mut h = x
        .wrapping_mul(0x9E37_79B1)
        .wrapping_add(y.wrapping_mul(0x85EB_CA77))
        .wrapping_add(seed.wrapping_mul(0xC2B2_AE3D));
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    (h >> 24) as u8
}

/// Colour texture made of 2x2 noise cells, distinct per seed.
pub fn texture(width: u32, height: u32, seed: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let (cx, cy) = (x / 2, y / 2);
        Rgb([
            mix(cx, cy, seed * 3),
            mix(cx, cy, seed * 3 + 1),
            mix(cx, cy, seed * 3 + 2),
        ])
    })
}

pub fn gray_texture(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([mix(x / 2, y / 2, seed)]))
}

pub fn png(image: DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

pub fn jpeg(image: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buffer = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))
        .unwrap();
    buffer
}

/// Decodes `data` and encodes it again as JPEG, the way a re-save would.
pub fn recompress(data: &[u8], quality: u8) -> Vec<u8> {
    let image = image::load_from_memory(data).unwrap();
    jpeg(&DynamicImage::ImageRgb8(image.to_rgb8()), quality)
}

/// Keeps the top-left `fraction` of each axis.
pub fn crop(image: &RgbImage, fraction: f64) -> RgbImage {
    let width = (image.width() as f64 * fraction) as u32;
    let height = (image.height() as f64 * fraction) as u32;
    image::imageops::crop_imm(image, 0, 0, width, height).to_image()
}

pub fn write(dir: &Path, name: &str, data: &[u8]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), data).unwrap();
}
