//! Inference adapter and model boundaries for dronelens.
//!
//! The detection and training models are external; this crate wraps them
//! behind traits, owns the class-id label policies, converts raw
//! detections into table rows, and renders box overlays.

pub mod draw;
pub mod error;
pub mod labels;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod service;
pub mod train;

pub use error::{VisionError, VisionResult};
pub use labels::{LabelEntry, LabelMap};
pub use model::{BoundingBox, DetectParams, Detection, LazyDetector, ObjectDetector};
#[cfg(feature = "onnx")]
pub use onnx::YoloOnnx;
pub use service::{DetectionRow, Inference, InferenceService};
pub use train::{
    expected_weights_path, ProcessTrainer, TrainOutcome, TrainSpec, TrainerBackend,
};
