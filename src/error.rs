use thiserror::Error;

use crate::models::Quad;

pub type Result<T> = std::result::Result<T, SceneError>;

/// Errors raised by the analysis stages for a single text region.
///
/// Neither variant is fatal to a batch: callers decide whether to skip the
/// offending instance or abort.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// The polygon selects no pixels of the image, so no color statistics exist.
    #[error("polygon {bbox:?} selects no pixels")]
    EmptyRegion { bbox: Quad },

    /// The detection polygon cannot describe a region (collapsed vertices, zero area).
    #[error("degenerate geometry for {text:?}: {reason}")]
    DegenerateGeometry { text: String, reason: String },
}
