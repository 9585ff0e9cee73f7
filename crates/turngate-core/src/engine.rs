//! Face engine capability — the one seam between the decision pipeline
//! and whichever recognition backend the deployment runs.

use crate::types::Detection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A face detection + embedding backend.
///
/// Implementations are selected once at startup from configuration; the
/// capture loop depends only on this trait. A failing call is treated
/// as "no detections this frame" by the caller, never propagated.
pub trait FaceEngine {
    /// Detect faces in a grayscale frame and extract an embedding for
    /// each. Boxes are in frame pixel coordinates, clamped to frame
    /// bounds, in the backend's native output order.
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, DetectError>;
}
