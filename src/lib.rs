pub mod analysis;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod geolocation;
pub mod geometry;
pub mod models;
pub mod panorama;
pub mod pipeline;

pub use analysis::{ColorProfiler, StreetClassifier, WordMerger};
pub use config::SceneConfig;
pub use core::WordsArchive;
pub use detection::{DeduplicationEngine, DetectionSource, ImageWindows, OcrsDetector};
pub use error::SceneError;
pub use geolocation::{LocationOutcome, LocationSearch, NominatimClient};
pub use models::{CharacterizedInstance, ColorFingerprint, Detection, Point, Quad, TextInstance};
pub use panorama::{PanoramaBuilder, StripPanorama};
pub use pipeline::{SceneReport, ScenePipeline};
