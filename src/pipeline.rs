use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use image::DynamicImage;
use log::{debug, info};
use serde::Serialize;

use crate::analysis::{ColorProfiler, StreetClassifier, WordMerger};
use crate::config::SceneConfig;
use crate::detection::{self, DeduplicationEngine, DetectionSource, ImageWindows};
use crate::geolocation::{self, LocationOutcome, LocationSearch};
use crate::models::{CharacterizedInstance, Detection, TextInstance};

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Everything extracted from one panorama
#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneReport {
    /// Deduplicated detections, before merging
    pub words: Vec<TextInstance>,
    pub streets: Vec<CharacterizedInstance>,
    pub others: Vec<CharacterizedInstance>,
}

impl SceneReport {
    /// Streets first, then others
    pub fn regions(&self) -> impl Iterator<Item = &CharacterizedInstance> {
        self.streets.iter().chain(self.others.iter())
    }

    /// Text listing of both groups, one tab-indented entry per line
    pub fn extracted_words(&self) -> String {
        let mut out = String::from("streets:");
        for street in &self.streets {
            out.push_str("\n\t");
            out.push_str(street.text());
        }
        out.push_str("\nothers:");
        for other in &self.others {
            out.push_str("\n\t");
            out.push_str(other.text());
        }
        out.push('\n');
        out
    }

    pub async fn geolocate<L: LocationSearch>(
        &self,
        search: &L,
        timeout: Duration,
    ) -> LocationOutcome {
        geolocation::locate(search, &self.streets, &self.others, timeout).await
    }
}

/// Detection and analysis of one panorama with a fixed configuration
pub struct ScenePipeline {
    config: SceneConfig,
    debug: Option<DebugConfig>,
}

impl ScenePipeline {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            config,
            debug: None,
        }
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Pipeline for one scene of a batch, dumping debug stages to
    /// `<debug dir>/<scene_name>` instead of the shared root.
    pub fn for_scene(&self, scene_name: &str) -> Result<Self> {
        let pipeline = Self::new(self.config.clone());
        match &self.debug {
            Some(debug_config) => pipeline.with_debug(debug_config.output_dir.join(scene_name)),
            None => Ok(pipeline),
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn windows(&self, panorama: &DynamicImage) -> ImageWindows {
        ImageWindows::for_image(panorama, &self.config.window)
    }

    /// Windowed detection over the whole panorama, duplicates removed
    pub fn detect<S>(&self, source: &S, panorama: &DynamicImage) -> Result<Vec<TextInstance>>
    where
        S: DetectionSource + ?Sized,
    {
        let windows = self.windows(panorama);
        info!(
            "Splitting {}x{} panorama into {} windows",
            panorama.width(),
            panorama.height(),
            windows.len()
        );

        let engine = DeduplicationEngine::new(self.config.dedup.clone());
        let words = detection::detect_panorama(source, panorama, windows.as_slice(), &engine)?;

        self.save_debug_stage(1, "detection", &words)?;
        Ok(words)
    }

    /// Color profiling, merging and classification of detected words
    pub fn analyze(&self, panorama: &DynamicImage, words: Vec<TextInstance>) -> Result<SceneReport> {
        let profiler = ColorProfiler::new(panorama);

        let merger = WordMerger::new(self.config.merge.clone());
        let merged = merger.merge(
            words.iter().cloned().map(Detection::Raw).collect(),
            &profiler,
        );
        info!("Merged {} words into {} regions", words.len(), merged.len());
        self.save_debug_stage(2, "merge", &merged)?;

        let classifier = StreetClassifier::new(self.config.classifier.clone())
            .with_panorama_height(panorama.height());
        let (streets, others) = classifier.classify(merged);
        info!("Found {} street names and {} other texts", streets.len(), others.len());

        let report = SceneReport {
            words,
            streets,
            others,
        };
        self.save_debug_stage(3, "classification", &report)?;

        Ok(report)
    }

    pub fn run<S>(&self, source: &S, panorama: &DynamicImage) -> Result<SceneReport>
    where
        S: DetectionSource + ?Sized,
    {
        let words = self.detect(source, panorama)?;
        self.analyze(panorama, words)
    }

    fn save_debug_stage<T: Serialize + ?Sized>(
        &self,
        index: usize,
        name: &str,
        value: &T,
    ) -> Result<()> {
        let Some(debug_config) = &self.debug else {
            return Ok(());
        };

        let stage_dir = debug_config.output_dir.join(format!("{:02}_{}", index, name));
        std::fs::create_dir_all(&stage_dir)?;

        let path = stage_dir.join("data.json");
        write_json(&path, value)?;

        debug!("Debug: saved {}", path.display());
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize debug data")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
