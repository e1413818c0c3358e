pub mod classify;
pub mod color;
pub mod merge;

pub use classify::StreetClassifier;
pub use color::{ColorProfiler, HsvImage};
pub use merge::WordMerger;
