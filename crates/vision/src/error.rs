//! Vision error types.

use thiserror::Error;

/// Errors from the inference adapter and training boundary.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("model error: {0}")]
    Model(String),

    #[error("label config error: {0}")]
    LabelConfig(String),

    #[error("training error: {0}")]
    Train(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for vision operations.
pub type VisionResult<T> = std::result::Result<T, VisionError>;
