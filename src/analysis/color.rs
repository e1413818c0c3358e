//! Color fingerprints of text regions.
//!
//! The panorama is converted to HSV once, using the 8-bit convention of the
//! usual vision libraries: hue in [0, 180), saturation and value in [0, 255].
//! Each region is then summarised by a normal fit per channel over exactly the
//! pixels its polygon encloses.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;
use log::warn;
use rayon::prelude::*;

use crate::error::{Result, SceneError};
use crate::models::{CharacterizedInstance, ColorFingerprint, Detection, Quad, TextInstance};

/// HSV copy of an image, computed once and shared by every profile call
#[derive(Debug, Clone)]
pub struct HsvImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl HsvImage {
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let pixels = rgb
            .as_raw()
            .par_chunks_exact(3)
            .map(|px| rgb_to_hsv(px[0], px[1], px[2]))
            .collect();

        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels[(y as usize) * (self.width as usize) + x as usize]
    }
}

/// 8-bit RGB to HSV with hue halved to fit a byte
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { 255.0 * delta / v } else { 0.0 };

    let h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    let h = (h / 2.0).round();
    let h = if h >= 180.0 { h - 180.0 } else { h };

    [h as u8, s.round() as u8, v as u8]
}

/// Computes color fingerprints against one cached image
#[derive(Debug, Clone)]
pub struct ColorProfiler {
    hsv: HsvImage,
}

impl ColorProfiler {
    pub fn new(image: &DynamicImage) -> Self {
        Self {
            hsv: HsvImage::from_image(image),
        }
    }

    pub fn from_hsv(hsv: HsvImage) -> Self {
        Self { hsv }
    }

    pub fn hsv(&self) -> &HsvImage {
        &self.hsv
    }

    /// Fingerprint of the pixels enclosed by `bbox`, boundary included
    pub fn profile(&self, bbox: &Quad) -> Result<ColorFingerprint> {
        let samples = self.masked_pixels(bbox)?;

        let (hue_mean, hue_std) = fit_normal(&samples, 0);
        let (sat_mean, sat_std) = fit_normal(&samples, 1);
        let (val_mean, val_std) = fit_normal(&samples, 2);

        Ok(ColorFingerprint {
            hue_mean,
            hue_std,
            sat_mean,
            sat_std,
            val_mean,
            val_std,
        })
    }

    /// Profile every detection in parallel, keeping input order.
    ///
    /// Detections that already carry a fingerprint pass through unchanged.
    /// Regions without pixels are skipped with a warning.
    pub fn characterize(&self, detections: Vec<Detection>) -> Vec<CharacterizedInstance> {
        let results: Vec<Result<CharacterizedInstance>> = detections
            .into_par_iter()
            .map(|detection| match detection {
                Detection::Characterized(characterized) => Ok(characterized),
                Detection::Raw(instance) => self
                    .profile(&instance.bbox)
                    .map(|fingerprint| CharacterizedInstance::new(instance, fingerprint)),
            })
            .collect();

        results
            .into_iter()
            .filter_map(|result| match result {
                Ok(characterized) => Some(characterized),
                Err(e) => {
                    warn!("Skipping region without color statistics: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn characterize_instances(&self, instances: Vec<TextInstance>) -> Vec<CharacterizedInstance> {
        self.characterize(instances.into_iter().map(Detection::Raw).collect())
    }

    fn masked_pixels(&self, bbox: &Quad) -> Result<Vec<[u8; 3]>> {
        let empty = || SceneError::EmptyRegion { bbox: *bbox };

        if bbox.distinct_vertices() < 3 || self.hsv.width == 0 || self.hsv.height == 0 {
            return Err(empty());
        }

        let (min_x, min_y, max_x, max_y) = bbox.bounds();
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return Err(empty());
        }

        // Clip the polygon's bounding rectangle to the image
        let x0 = (min_x.floor() as i64).max(0);
        let y0 = (min_y.floor() as i64).max(0);
        let x1 = (max_x.ceil() as i64).min(self.hsv.width as i64 - 1);
        let y1 = (max_y.ceil() as i64).min(self.hsv.height as i64 - 1);
        if x0 > x1 || y0 > y1 {
            return Err(empty());
        }

        let mask_w = (x1 - x0 + 1) as u32;
        let mask_h = (y1 - y0 + 1) as u32;
        let mut mask = GrayImage::new(mask_w, mask_h);

        let mut poly: Vec<PixelPoint<i32>> = bbox
            .points()
            .iter()
            .map(|p| PixelPoint::new(p.x.round() as i32 - x0 as i32, p.y.round() as i32 - y0 as i32))
            .collect();
        poly.dedup();
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }

        let on = Luma([255u8]);
        match poly.as_slice() {
            [] => return Err(empty()),
            [p] => {
                if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask_w && (p.y as u32) < mask_h {
                    mask.put_pixel(p.x as u32, p.y as u32, on);
                }
            }
            [a, b] => draw_line_segment_mut(
                &mut mask,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                on,
            ),
            _ => draw_polygon_mut(&mut mask, &poly, on),
        }

        let samples: Vec<[u8; 3]> = mask
            .enumerate_pixels()
            .filter(|(_, _, px)| px[0] > 0)
            .map(|(mx, my, _)| self.hsv.get(x0 as u32 + mx, y0 as u32 + my))
            .collect();

        if samples.is_empty() {
            return Err(empty());
        }
        Ok(samples)
    }
}

/// Maximum-likelihood normal fit (mean, population std) of one channel, two-pass
fn fit_normal(samples: &[[u8; 3]], channel: usize) -> (f64, f64) {
    let n = samples.len() as f64;
    let sum: u64 = samples.iter().map(|px| px[channel] as u64).sum();
    let mean = sum as f64 / n;

    let squared: f64 = samples
        .iter()
        .map(|px| {
            let d = px[channel] as f64 - mean;
            d * d
        })
        .sum();
    let std = (squared / n).sqrt();

    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_hues() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
    }

    #[test]
    fn greys_have_no_hue_or_saturation() {
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
    }

    #[test]
    fn fit_normal_population_std() {
        let samples = [[0, 0, 0], [10, 0, 0]];
        let (mean, std) = fit_normal(&samples, 0);
        assert_eq!(mean, 5.0);
        assert_eq!(std, 5.0);
    }
}
