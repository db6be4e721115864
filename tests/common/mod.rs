//! Synthetic image fixtures shared by the integration tests.

#![allow(dead_code)]

use image::{imageops, Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Asymmetric test scene: diagonal gradient, a bright block in the upper
/// left and a dark disc in the lower right.
pub fn scene(size: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        let fx = x as f32 / size as f32;
        let fy = y as f32 / size as f32;
        let mut v = 30.0 + 100.0 * fx + 30.0 * fy;
        if fx < 0.4 && fy < 0.5 {
            v += 70.0;
        }
        if (fx - 0.75).powi(2) + (fy - 0.7).powi(2) < 0.03 {
            v -= 60.0;
        }
        Rgb([v as u8, (v * 0.8) as u8, (255.0 - v) as u8])
    })
}

/// The scene with every channel inverted.
pub fn inverted_scene(size: u32) -> RgbImage {
    let mut img = scene(size);
    imageops::invert(&mut img);
    img
}

/// A single flat color.
pub fn solid(size: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(size, size, Rgb(color))
}

/// Save `img` as `dir/name` and return the path.
pub fn save(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}
