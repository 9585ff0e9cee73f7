use serde::{Deserialize, Serialize};

/// Enrolled user identifier, matching the controller's staff ids.
pub type UserId = u32;

/// Reserved id for "no match / unknown person". Always resolves to a
/// display name in the roster, never to an embedding in the store.
pub const UNKNOWN_USER: UserId = 0;

/// Axis-aligned box in frame pixel coordinates.
///
/// `(x1, y1)` is the top-left corner, `(x2, y2)` the bottom-right.
/// Axis order is fixed at the detector boundary; nothing downstream
/// reorders coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Center point of the box.
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Clamp all coordinates into the frame bounds. A detector may
    /// report boxes partially outside the frame; geometry never errors.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Rect {
        let w = frame_width as f32;
        let h = frame_height as f32;
        Rect {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// Face embedding vector produced by a recognition model, compared by
/// Euclidean distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One detected face: where it is in the frame and what it looks like.
/// Lives for a single frame's decision, never persisted.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: Rect,
    pub embedding: Embedding,
}

/// Per-frame door decision value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Closed,
    Exit,
    Entrance,
}

impl DoorState {
    /// Wire code the turnstile controller expects: 1 = entrance, 2 = exit.
    pub fn direction_code(self) -> Option<u8> {
        match self {
            DoorState::Closed => None,
            DoorState::Entrance => Some(1),
            DoorState::Exit => Some(2),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DoorState::Closed => "closed",
            DoorState::Entrance => "entrance",
            DoorState::Exit => "exit",
        }
    }
}
