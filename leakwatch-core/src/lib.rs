pub mod types;
pub mod error;
pub mod config;

pub use error::{ConfigError, Result};
pub use types::{
    Detection, DetectionQuery, Detector, DetectorMode, DetectorSet,
    InferenceResult, PixelRect, Roi, POSITIVE_LABEL,
};
pub use config::{
    CameraConfig, FrameErrorPolicy, InferenceSettings, InputType, LeakDetectorIds,
    LeakWatchConfig, PipelineSettings, MAX_WAIT_SECS,
};
