use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Cannot submit an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Detector not found: {0}")]
    DetectorNotFound(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Service unavailable (HTTP {status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("Invalid response from service: {0}")]
    InvalidResponse(String),
}

impl InferenceError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::HttpRequest(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(false, |s| s.is_server_error())
            }
            InferenceError::RateLimit | InferenceError::ServiceUnavailable { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;
