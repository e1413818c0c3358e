use std::path::Path;

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;

use crate::detection::DetectionSource;
use crate::models::{Point, Quad, TextInstance};

/// ocrs does not score words; every recognized word gets this confidence
pub const DEFAULT_WORD_CONFIDENCE: f32 = 0.9;

/// Word-level text detector backed by the ocrs detection and recognition models
pub struct OcrsDetector {
    engine: OcrEngine,
    confidence: f32,
}

impl OcrsDetector {
    /// Load models from the standard ocrs cache location (`~/.cache/ocrs`)
    pub fn from_cache_dir() -> anyhow::Result<Self> {
        let home_dir = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;

        let cache_dir = Path::new(&home_dir).join(".cache/ocrs");
        let detection_model_path = cache_dir.join("text-detection.rten");
        let recognition_model_path = cache_dir.join("text-recognition.rten");

        if !detection_model_path.exists() || !recognition_model_path.exists() {
            anyhow::bail!(
                "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
                 Expected locations:\n  - {}\n  - {}",
                detection_model_path.display(),
                recognition_model_path.display()
            );
        }

        Self::from_models(&detection_model_path, &recognition_model_path)
    }

    pub fn from_models(detection_model: &Path, recognition_model: &Path) -> anyhow::Result<Self> {
        let detection_model = Model::load_file(detection_model)?;
        let recognition_model = Model::load_file(recognition_model)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })?;

        Ok(Self {
            engine,
            confidence: DEFAULT_WORD_CONFIDENCE,
        })
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

impl DetectionSource for OcrsDetector {
    fn detect_in_window(&self, window: &DynamicImage) -> anyhow::Result<Vec<TextInstance>> {
        let img = window.to_rgb8();

        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())?;
        let ocr_input = self.engine.prepare_input(img_source)?;

        let word_rects = self.engine.detect_words(&ocr_input)?;
        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);
        let lines = self.engine.recognize_text(&ocr_input, &line_rects)?;

        let mut instances = Vec::new();
        for line in lines.iter().flatten() {
            for word in line.words() {
                let text = word.to_string().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let corners = word
                    .rotated_rect()
                    .corners()
                    .map(|corner| Point::new(corner.x, corner.y));
                instances.push(TextInstance::new(Quad::ordered(corners), text, self.confidence));
            }
        }

        Ok(instances)
    }

    fn name(&self) -> &str {
        "ocrs"
    }
}
