//! Scene photographs to a single panorama.
//!
//! Feature-based stitching is left to external tools. The bundled builder only
//! lays pre-aligned photographs side by side.

use std::path::{Path, PathBuf};

use anyhow::Context;
use image::{DynamicImage, ImageReader, RgbImage, imageops};
use log::{debug, info, warn};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// File the runner writes the built panorama to, next to the photographs by default
pub const PANORAMA_FILE_NAME: &str = "panorama.png";

/// Combines the photographs of one scene into a panorama
pub trait PanoramaBuilder: Send + Sync {
    /// `reorder` asks the builder to infer left-to-right order itself
    /// instead of trusting the order of `images`.
    fn build(&self, images: &[DynamicImage], reorder: bool) -> anyhow::Result<DynamicImage>;

    fn name(&self) -> &str;
}

/// Side-by-side strip of photographs scaled to a common height
#[derive(Debug, Clone, Copy, Default)]
pub struct StripPanorama;

impl PanoramaBuilder for StripPanorama {
    fn build(&self, images: &[DynamicImage], reorder: bool) -> anyhow::Result<DynamicImage> {
        if images.is_empty() {
            anyhow::bail!("No images to build a panorama from");
        }
        if reorder {
            warn!("{} cannot reorder photographs; keeping file order", self.name());
        }
        if let Some(idx) = images.iter().position(|img| img.width() == 0 || img.height() == 0) {
            anyhow::bail!("Image {} is empty", idx);
        }

        // Shrink to the smallest height rather than upscale
        let height = images.iter().map(|img| img.height()).min().unwrap_or(0);

        let scaled: Vec<RgbImage> = images
            .iter()
            .map(|img| {
                let rgb = img.to_rgb8();
                if img.height() == height {
                    return rgb;
                }
                let width = ((img.width() as f64 * height as f64 / img.height() as f64).round()
                    as u32)
                    .max(1);
                imageops::resize(&rgb, width, height, imageops::FilterType::Triangle)
            })
            .collect();

        let width: u32 = scaled.iter().map(|img| img.width()).sum();
        let mut strip = RgbImage::new(width, height);

        let mut x = 0i64;
        for img in &scaled {
            imageops::replace(&mut strip, img, x, 0);
            x += img.width() as i64;
        }

        debug!("Built {}x{} strip from {} images", width, height, images.len());
        Ok(DynamicImage::ImageRgb8(strip))
    }

    fn name(&self) -> &str {
        "Strip Panorama"
    }
}

/// Image files directly inside `dir`, sorted by file name.
/// A previously written `panorama.png` is not a photograph and is skipped.
pub fn scene_image_paths<P: AsRef<Path>>(dir: P) -> anyhow::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();

    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to read scene dir {:?}", dir))?
    {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        let is_output = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.eq_ignore_ascii_case(PANORAMA_FILE_NAME));

        if path.is_file() && is_image && !is_output {
            paths.push(path);
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

pub fn load_scene_images<P: AsRef<Path>>(dir: P) -> anyhow::Result<Vec<DynamicImage>> {
    let dir = dir.as_ref();
    let paths = scene_image_paths(dir)?;
    if paths.is_empty() {
        anyhow::bail!("No images found in {:?}", dir);
    }

    paths
        .iter()
        .map(|path| {
            info!("Working on {:?}", path.file_name().unwrap_or_default());
            ImageReader::open(path)
                .with_context(|| format!("Failed to open image {:?}", path))?
                .decode()
                .with_context(|| format!("Failed to decode image {:?}", path))
        })
        .collect()
}
