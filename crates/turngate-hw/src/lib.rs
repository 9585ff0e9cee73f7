//! turngate-hw — camera capture for the decision loop.
//!
//! Provides V4L2 camera access, the grayscale `Frame` type, and the
//! `FrameSource` seam the capture loop (and its tests) run against.

pub mod camera;
pub mod frame;

pub use camera::{capture_with_retry, Camera, CameraError, FrameSource, PixelFormat};
pub use frame::Frame;
