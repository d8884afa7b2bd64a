//! Error types for leakwatch-eye

use leakwatch_core::ConfigError;
use leakwatch_inference::InferenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    /// The frame source has no more frames
    #[error("End of stream")]
    EndOfStream,

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCv(String),
}

impl VisionError {
    /// Whether processing the same frame again may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            VisionError::Inference(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<ConfigError> for VisionError {
    fn from(err: ConfigError) -> Self {
        VisionError::Config(err.to_string())
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;
