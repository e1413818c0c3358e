use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, ImageBuffer, Rgb};
use streetscan::detection::DetectionSource;
use streetscan::geolocation::{Location, LocationQuery, LocationSearch};
use streetscan::models::{Point, Quad, TextInstance};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Creates a single-color image
pub fn solid_image(width: u32, height: u32, color: Rgb<u8>) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, color))
}

/// Creates an image with a smooth gradient, so every channel varies
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) * 3 % 256) as u8])
    }))
}

/// Paints an axis-aligned rectangle, corners inclusive
pub fn paint_rect(image: &mut DynamicImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    let rgb = image.as_mut_rgb8().expect("fixtures use RGB8 images");
    for y in y0..=y1 {
        for x in x0..=x1 {
            rgb.put_pixel(x, y, color);
        }
    }
}

/// Creates a word with an axis-aligned box and a fixed confidence
pub fn make_word(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> TextInstance {
    TextInstance::new(Quad::from_rect(x0, y0, x1, y1), text, 0.9)
}

/// Creates a word lying on a line through `origin` tilted by `angle_deg`.
/// Corners go through `Quad::ordered` out of order, as a detector may report them.
pub fn tilted_word(
    text: &str,
    origin: (f32, f32),
    angle_deg: f32,
    start: f32,
    len: f32,
    height: f32,
) -> TextInstance {
    let angle = angle_deg.to_radians();
    let (u, n) = ((angle.cos(), angle.sin()), (-angle.sin(), angle.cos()));
    let corner =
        |a: f32, b: f32| Point::new(origin.0 + a * u.0 + b * n.0, origin.1 + a * u.1 + b * n.1);

    let quad = Quad::ordered([
        corner(start + len, height),
        corner(start, 0.0),
        corner(start, height),
        corner(start + len, 0.0),
    ]);
    TextInstance::new(quad, text, 0.9)
}

/// Detection source that replays one prepared batch per call
pub struct ScriptedSource {
    batches: Mutex<VecDeque<Vec<TextInstance>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Vec<TextInstance>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DetectionSource for ScriptedSource {
    fn detect_in_window(&self, _window: &DynamicImage) -> anyhow::Result<Vec<TextInstance>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut batches = self
            .batches
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?;
        Ok(batches.pop_front().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Detection source that always fails
pub struct BrokenSource;

impl DetectionSource for BrokenSource {
    fn detect_in_window(&self, _window: &DynamicImage) -> anyhow::Result<Vec<TextInstance>> {
        anyhow::bail!("model not loaded")
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Location service stand-in with a canned answer and an optional delay
pub struct FakeSearch {
    answer: Result<Vec<Location>, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeSearch {
    pub fn answering(locations: Vec<Location>) -> Self {
        Self {
            answer: Ok(locations),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            answer: Err(reason.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocationSearch for FakeSearch {
    async fn search_location(&self, _query: &LocationQuery) -> anyhow::Result<Vec<Location>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone().map_err(|reason| anyhow::anyhow!(reason))
    }
}

pub fn make_location(name: &str) -> Location {
    Location {
        lat: 40.7128,
        lon: -74.006,
        display_name: name.to_string(),
    }
}
