//! Tunable thresholds for every stage, passed explicitly at construction.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub window: WindowConfig,
    pub dedup: DedupConfig,
    pub merge: MergeConfig,
    pub classifier: ClassifierConfig,
    pub geolocation: GeolocationConfig,
}

impl SceneConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Side length of a detection window in pixels
    pub size: u32,
    /// Fraction of a window shared with its neighbour, in [0, 1)
    pub overlap: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: 1520,
            overlap: 0.5,
        }
    }
}

/// Which detection survives when two windows report the same text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// First-seen wins
    #[default]
    KeepFirst,
    /// Higher confidence wins among duplicates of the same batch
    KeepBest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub iou_threshold: f32,
    /// Largest case-insensitive edit distance still counted as the same text
    pub max_edit_distance: usize,
    /// Texts shorter than this (in characters) must match exactly
    pub min_fuzzy_len: usize,
    /// Polygons at or below this area are discarded as degenerate
    pub min_area: f32,
    pub policy: ConflictPolicy,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.5,
            max_edit_distance: 1,
            min_fuzzy_len: 3,
            min_area: 1.0,
            policy: ConflictPolicy::KeepFirst,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub max_angle_deg: f32,
    /// Smaller height over larger height
    pub min_height_ratio: f32,
    /// Allowed baseline offset, in mean word heights
    pub baseline_tolerance: f32,
    /// Allowed gap between words, in mean word heights
    pub max_gap_ratio: f32,
    /// Allowed overlap between words, in mean word heights
    pub max_overlap_ratio: f32,
    /// Largest fingerprint mean distance between words; `None` disables the check
    pub max_color_distance: Option<f64>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_angle_deg: 10.0,
            min_height_ratio: 0.6,
            baseline_tolerance: 0.35,
            max_gap_ratio: 1.0,
            max_overlap_ratio: 0.5,
            max_color_distance: Some(60.0),
        }
    }
}

/// Mean HSV color of the street signs in the target city
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceColor {
    pub hue: f64,
    pub sat: f64,
    pub val: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// A region is a street name when its grade is strictly above this
    pub threshold: f32,
    pub suffix_weight: f32,
    pub street_suffixes: Vec<String>,
    /// Added when every token is a number (house numbers, prices)
    pub numeric_penalty: f32,
    pub aspect_weight: f32,
    /// Inclusive (min, max) width/height ratio
    pub aspect_range: (f32, f32),
    pub size_weight: f32,
    /// Inclusive (min, max) region height over panorama height
    pub relative_height_range: (f32, f32),
    pub color_weight: f32,
    /// Distance at which color similarity reaches zero
    pub color_scale: f64,
    pub reference_color: Option<ReferenceColor>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let street_suffixes = [
            "ST", "STREET", "AVE", "AV", "AVENUE", "BLVD", "BOULEVARD", "RD", "ROAD", "LN",
            "LANE", "DR", "DRIVE", "WAY", "PL", "PLACE", "CT", "COURT", "SQ", "SQUARE", "HWY",
            "HIGHWAY", "PKWY", "PARKWAY", "TER", "TERRACE", "ALY", "ALLEY", "CIR", "CIRCLE",
            "EXPY", "FWY", "TPKE", "PLZ", "PLAZA", "BROADWAY",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            threshold: 1.0,
            suffix_weight: 2.0,
            street_suffixes,
            numeric_penalty: -0.5,
            aspect_weight: 0.5,
            aspect_range: (1.5, 20.0),
            size_weight: 0.25,
            relative_height_range: (0.005, 0.1),
            color_weight: 0.75,
            color_scale: 120.0,
            reference_color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_results: usize,
    /// Appended to every query, e.g. a city name
    pub region_hint: Option<String>,
    pub user_agent: String,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            timeout_secs: 10,
            max_results: 5,
            region_hint: None,
            user_agent: concat!("streetscan/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
