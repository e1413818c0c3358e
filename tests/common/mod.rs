#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from streetscan for tests
pub use streetscan::config::{
    ClassifierConfig, ConflictPolicy, DedupConfig, MergeConfig, ReferenceColor, SceneConfig,
    WindowConfig,
};
pub use streetscan::models::{CharacterizedInstance, Detection, Point, Quad, TextInstance};
