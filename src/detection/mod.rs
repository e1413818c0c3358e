pub mod dedup;
pub mod ocr;
pub mod windows;

use anyhow::Context;
use image::DynamicImage;
use log::{debug, info};

use crate::models::TextInstance;

pub use dedup::{DedupReport, DeduplicationEngine, DetectionAccumulator};
pub use ocr::OcrsDetector;
pub use windows::{ImageWindows, Window};

/// A text detector run on one window at a time
pub trait DetectionSource: Send + Sync {
    /// Detect text in `window`, coordinates relative to the window's top-left corner
    fn detect_in_window(&self, window: &DynamicImage) -> anyhow::Result<Vec<TextInstance>>;

    /// Human-readable name for this detector (used in log output)
    fn name(&self) -> &str;
}

/// Run `source` over `windows` in the given order and deduplicate the results.
///
/// Later windows are compared against everything accumulated from earlier
/// ones, so the order of `windows` decides which redetection survives.
pub fn detect_panorama<S>(
    source: &S,
    panorama: &DynamicImage,
    windows: &[Window],
    engine: &DeduplicationEngine,
) -> anyhow::Result<Vec<TextInstance>>
where
    S: DetectionSource + ?Sized,
{
    let mut accumulator = DetectionAccumulator::new(engine.clone());

    for (idx, window) in windows.iter().enumerate() {
        info!("Detecting text in window {}/{}", idx + 1, windows.len());

        let crop = window.crop(panorama);
        let local = source.detect_in_window(&crop).with_context(|| {
            format!(
                "{} failed on window {} at ({}, {})",
                source.name(),
                window.index,
                window.x,
                window.y
            )
        })?;

        let absolute: Vec<TextInstance> = local
            .iter()
            .map(|word| word.translated(window.x as f32, window.y as f32))
            .collect();

        let found = absolute.len();
        let added = accumulator.push_window(absolute);
        debug!(
            "Window {}: {} detections, {} new ({} total)",
            window.index,
            found,
            added,
            accumulator.words().len()
        );
    }

    info!(
        "Done extracting text: {} unique words ({} degenerate discarded)",
        accumulator.words().len(),
        accumulator.discarded()
    );
    Ok(accumulator.into_words())
}
