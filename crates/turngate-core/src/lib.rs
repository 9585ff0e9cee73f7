//! turngate-core — per-frame access decision core.
//!
//! Matches detected faces against enrolled embeddings, classifies zone
//! membership (entrance/exit side), and gates actuation through a
//! debounce state machine. Inference runs via ONNX Runtime.

pub mod debounce;
pub mod engine;
pub mod onnx;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod zone;

pub use debounce::Debouncer;
pub use engine::{DetectError, FaceEngine};
pub use pipeline::{decide, FrameDecision};
pub use store::EmbeddingStore;
pub use types::{Detection, DoorState, Embedding, Rect, UserId, UNKNOWN_USER};
pub use zone::{FractionalRect, ZoneMode, Zones};
