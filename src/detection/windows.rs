use image::DynamicImage;

use crate::config::WindowConfig;

/// Rectangular sub-region of the panorama handed to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Position in processing order
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Window {
    pub fn crop(&self, image: &DynamicImage) -> DynamicImage {
        image.crop_imm(self.x, self.y, self.width, self.height)
    }
}

/// Overlapping windows covering an image, ordered row by row, left to right.
///
/// The last window of a row/column is aligned to the image edge, so every
/// window has the full configured size unless the image itself is smaller.
#[derive(Debug, Clone)]
pub struct ImageWindows {
    windows: Vec<Window>,
}

impl ImageWindows {
    pub fn new(width: u32, height: u32, config: &WindowConfig) -> Self {
        let size = config.size.max(1);
        let overlap = config.overlap.clamp(0.0, 0.95);
        let stride = ((size as f32 * (1.0 - overlap)).round() as u32).max(1);

        let xs = axis_offsets(width, size, stride);
        let ys = axis_offsets(height, size, stride);

        let mut windows = Vec::with_capacity(xs.len() * ys.len());
        for &y in &ys {
            for &x in &xs {
                windows.push(Window {
                    index: windows.len(),
                    x,
                    y,
                    width: size.min(width),
                    height: size.min(height),
                });
            }
        }

        Self { windows }
    }

    pub fn for_image(image: &DynamicImage, config: &WindowConfig) -> Self {
        Self::new(image.width(), image.height(), config)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn as_slice(&self) -> &[Window] {
        &self.windows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Window> {
        self.windows.iter()
    }
}

impl<'a> IntoIterator for &'a ImageWindows {
    type Item = &'a Window;
    type IntoIter = std::slice::Iter<'a, Window>;

    fn into_iter(self) -> Self::IntoIter {
        self.windows.iter()
    }
}

fn axis_offsets(extent: u32, size: u32, stride: u32) -> Vec<u32> {
    if extent == 0 {
        return Vec::new();
    }
    if extent <= size {
        return vec![0];
    }

    let last = extent - size;
    let mut offsets: Vec<u32> = (0..last).step_by(stride as usize).collect();
    offsets.push(last);
    offsets
}
