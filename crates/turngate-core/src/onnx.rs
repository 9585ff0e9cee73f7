//! ONNX Runtime face engine.
//!
//! Two-stage backend: a single-stage face detection model whose export
//! includes score filtering and NMS (output rows of
//! `[score, x1, y1, x2, y2]` with normalized coordinates), followed by
//! an embedding model run on each face crop. The `arcface` and
//! `facenet` profiles share the detection stage and differ in crop
//! geometry and normalization.

use crate::engine::{DetectError, FaceEngine};
use crate::types::{Detection, Embedding, Rect};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const DETECT_INPUT_SIZE: usize = 320;
const DETECT_MEAN: f32 = 127.5;
const DETECT_STD: f32 = 128.0;
const DETECT_CONFIDENCE_THRESHOLD: f32 = 0.6;
const DETECT_FIELDS: usize = 5; // score, x1, y1, x2, y2

/// Embedding model geometry and normalization profile.
#[derive(Debug, Clone, Copy)]
pub struct EmbedderProfile {
    pub input_size: usize,
    pub mean: f32,
    pub std: f32,
    pub embedding_dim: usize,
}

impl EmbedderProfile {
    /// ArcFace-style exports: 112x112 input, symmetric normalization.
    pub const ARCFACE: Self = Self {
        input_size: 112,
        mean: 127.5,
        std: 127.5,
        embedding_dim: 512,
    };

    /// FaceNet (Inception-ResNet v1) exports: 160x160 input.
    pub const FACENET: Self = Self {
        input_size: 160,
        mean: 127.5,
        std: 128.0,
        embedding_dim: 512,
    };
}

/// ONNX-backed face engine: detection session + embedding session.
pub struct OnnxEngine {
    detector: Session,
    embedder: Session,
    profile: EmbedderProfile,
}

impl OnnxEngine {
    /// Load both models. Fails fast if either file is missing.
    pub fn load(
        detector_path: &str,
        embedder_path: &str,
        profile: EmbedderProfile,
    ) -> Result<Self, DetectError> {
        let detector = load_session(detector_path)?;
        let embedder = load_session(embedder_path)?;

        tracing::info!(
            detector = detector_path,
            embedder = embedder_path,
            input_size = profile.input_size,
            "face engine loaded"
        );

        Ok(Self {
            detector,
            embedder,
            profile,
        })
    }

    fn detect_boxes(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Rect>, DetectError> {
        let full = Rect::new(0.0, 0.0, width as f32, height as f32);
        let resized = resize_region(gray, width, height, &full, DETECT_INPUT_SIZE);
        let input = to_tensor(&resized, DETECT_INPUT_SIZE, DETECT_MEAN, DETECT_STD);

        let outputs = self
            .detector
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::InferenceFailed(format!("detection output: {e}")))?;

        Ok(parse_detections(
            data,
            width,
            height,
            DETECT_CONFIDENCE_THRESHOLD,
        ))
    }

    fn embed(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        bbox: &Rect,
    ) -> Result<Embedding, DetectError> {
        let crop = resize_region(gray, width, height, bbox, self.profile.input_size);
        let input = to_tensor(&crop, self.profile.input_size, self.profile.mean, self.profile.std);

        let outputs = self
            .embedder
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::InferenceFailed(format!("embedding output: {e}")))?;

        if raw.len() != self.profile.embedding_dim {
            return Err(DetectError::InferenceFailed(format!(
                "expected {}-dim embedding, got {}",
                self.profile.embedding_dim,
                raw.len()
            )));
        }

        Ok(Embedding::new(l2_normalize(raw.to_vec())))
    }
}

impl FaceEngine for OnnxEngine {
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, DetectError> {
        let boxes = self.detect_boxes(gray, width, height)?;

        let mut detections = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let embedding = self.embed(gray, width, height, &bbox)?;
            detections.push(Detection { bbox, embedding });
        }
        Ok(detections)
    }
}

fn load_session(model_path: &str) -> Result<Session, DetectError> {
    if !Path::new(model_path).exists() {
        return Err(DetectError::ModelNotFound(model_path.to_string()));
    }
    Ok(Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(model_path)?)
}

/// Parse detection rows of `[score, x1, y1, x2, y2]` with coordinates
/// normalized to `[0, 1]`, keeping boxes above the confidence threshold
/// scaled to frame pixels and clamped to frame bounds.
fn parse_detections(data: &[f32], width: u32, height: u32, confidence: f32) -> Vec<Rect> {
    let fw = width as f32;
    let fh = height as f32;
    data.chunks_exact(DETECT_FIELDS)
        .filter(|row| row[0] >= confidence)
        .map(|row| {
            Rect::new(row[1] * fw, row[2] * fh, row[3] * fw, row[4] * fh).clamp_to(width, height)
        })
        .collect()
}

/// Resize a region of a grayscale frame to a square patch using
/// bilinear interpolation.
fn resize_region(gray: &[u8], width: u32, height: u32, src: &Rect, dst_size: usize) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let src = src.clamp_to(width, height);
    let src_w = src.width().max(1.0);
    let src_h = src.height().max(1.0);

    let scale_x = src_w / dst_size as f32;
    let scale_y = src_h / dst_size as f32;

    let mut out = vec![0u8; dst_size * dst_size];
    for dy in 0..dst_size {
        let sy = src.y1 + (dy as f32 + 0.5) * scale_y - 0.5;
        let y0 = (sy.floor() as i64).clamp(0, h as i64 - 1) as usize;
        let y1 = (y0 + 1).min(h - 1);
        let fy = (sy - sy.floor()).clamp(0.0, 1.0);

        for dx in 0..dst_size {
            let sx = src.x1 + (dx as f32 + 0.5) * scale_x - 0.5;
            let x0 = (sx.floor() as i64).clamp(0, w as i64 - 1) as usize;
            let x1 = (x0 + 1).min(w - 1);
            let fx = (sx - sx.floor()).clamp(0.0, 1.0);

            let tl = gray[y0 * w + x0] as f32;
            let tr = gray[y0 * w + x1] as f32;
            let bl = gray[y1 * w + x0] as f32;
            let br = gray[y1 * w + x1] as f32;

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            out[dy * dst_size + dx] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Grayscale patch to NCHW float tensor, Y replicated across the three
/// channels.
fn to_tensor(patch: &[u8], size: usize, mean: f32, std: f32) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let pixel = patch.get(y * size + x).copied().unwrap_or(0) as f32;
            let normalized = (pixel - mean) / std;
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }
    tensor
}

fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}
