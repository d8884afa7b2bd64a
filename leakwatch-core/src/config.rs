//! Configuration for leakwatch
//!
//! Two documents drive a deployment: the detection config (endpoint, detector
//! ids, motion gating, inference and pipeline tuning) and the camera config.
//! Both are loaded once at startup and passed by value into the components
//! that need them.

use crate::error::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted when no endpoint is configured
pub const ENDPOINT_ENV: &str = "GROUNDLIGHT_ENDPOINT";

/// Default fraction of the frame size added around each region
pub const DEFAULT_ROI_PADDING: f64 = 0.05;

/// Default motion threshold, in percent of changed channel samples
pub const DEFAULT_MOTION_THRESHOLD: f64 = 0.1;

/// Longest time a query may wait for a confident answer, in seconds
pub const MAX_WAIT_SECS: f64 = 86_400.0;

/// Identifiers of the three leak detectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakDetectorIds {
    /// Binary leak detector
    pub detect_leaks: String,
    /// Counting detector that localizes each leak
    pub count_leaks: String,
    /// Multi-class leak classifier
    pub classify_leaks: String,
}

/// Inference client tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Environment variable holding the API token
    pub api_token_env: String,
    /// Timeout for a single HTTP request
    pub request_timeout_secs: u64,
    /// How long to keep polling for a confident answer (0 disables polling)
    pub wait_secs: f64,
    pub poll_initial_delay_ms: u64,
    pub poll_backoff: f64,
    pub poll_max_delay_ms: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_token_env: "GROUNDLIGHT_API_TOKEN".to_string(),
            request_timeout_secs: 10,
            wait_secs: 30.0,
            poll_initial_delay_ms: 200,
            poll_backoff: 1.4,
            poll_max_delay_ms: 5000,
        }
    }
}

/// What the frame loop does when processing a frame fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FrameErrorPolicy {
    /// Any failure ends the loop
    FailFast,
    /// Transient failures are retried, then the frame is skipped
    SkipTransient {
        #[serde(default = "default_max_retries")]
        max_retries: u32,
        #[serde(default = "default_max_consecutive_failures")]
        max_consecutive_failures: u32,
    },
}

fn default_max_retries() -> u32 {
    1
}

fn default_max_consecutive_failures() -> u32 {
    10
}

impl Default for FrameErrorPolicy {
    fn default() -> Self {
        FrameErrorPolicy::FailFast
    }
}

/// Cascade tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Context added on each side of a region, as a fraction of the frame size
    pub roi_padding: f64,
    /// Classify the regions of one frame concurrently
    pub parallel_classification: bool,
    pub on_frame_error: FrameErrorPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            roi_padding: DEFAULT_ROI_PADDING,
            parallel_classification: false,
            on_frame_error: FrameErrorPolicy::FailFast,
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakWatchConfig {
    /// Inference endpoint URL; `None` selects the service default
    #[serde(default)]
    pub endpoint: Option<String>,
    pub leak_detector_ids: LeakDetectorIds,
    #[serde(default)]
    pub enable_motion_detection: bool,
    #[serde(default = "default_motion_threshold")]
    pub motion_detection_threshold: f64,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

fn default_motion_threshold() -> f64 {
    DEFAULT_MOTION_THRESHOLD
}

impl LeakWatchConfig {
    pub fn new(leak_detector_ids: LeakDetectorIds) -> Self {
        Self {
            endpoint: None,
            leak_detector_ids,
            enable_motion_detection: false,
            motion_detection_threshold: DEFAULT_MOTION_THRESHOLD,
            inference: InferenceSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }

    /// Load, apply environment fallbacks and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config: Self = load_document(path.as_ref())?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a document in any supported format, without validating it
    pub fn from_str(content: &str) -> Result<Self> {
        parse_document(content, None)
    }

    /// Fill unset values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.endpoint.is_none() {
            self.endpoint = lookup(ENDPOINT_ENV).filter(|v| !v.trim().is_empty());
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let ids = &self.leak_detector_ids;
        for (name, id) in [
            ("detect_leaks", &ids.detect_leaks),
            ("count_leaks", &ids.count_leaks),
            ("classify_leaks", &ids.classify_leaks),
        ] {
            if id.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "leak_detector_ids.{} must not be empty",
                    name
                )));
            }
        }

        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "endpoint must be an http(s) URL, got '{}'",
                    endpoint
                )));
            }
        }

        let threshold = self.motion_detection_threshold;
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::Validation(
                "motion_detection_threshold must be between 0 and 100 percent".to_string(),
            ));
        }

        let inference = &self.inference;
        if inference.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "inference.request_timeout_secs must be > 0".to_string(),
            ));
        }
        if !(0.0..=MAX_WAIT_SECS).contains(&inference.wait_secs) {
            return Err(ConfigError::Validation(format!(
                "inference.wait_secs must be between 0 and {}",
                MAX_WAIT_SECS
            )));
        }
        if !inference.poll_backoff.is_finite() || inference.poll_backoff < 1.0 {
            return Err(ConfigError::Validation(
                "inference.poll_backoff must be >= 1.0".to_string(),
            ));
        }
        if inference.poll_initial_delay_ms == 0
            || inference.poll_max_delay_ms < inference.poll_initial_delay_ms
        {
            return Err(ConfigError::Validation(
                "inference poll delays must satisfy 0 < initial <= max".to_string(),
            ));
        }

        let padding = self.pipeline.roi_padding;
        if !padding.is_finite() || !(0.0..=0.5).contains(&padding) {
            return Err(ConfigError::Validation(
                "pipeline.roi_padding must be between 0 and 0.5".to_string(),
            ));
        }

        if let FrameErrorPolicy::SkipTransient {
            max_consecutive_failures,
            ..
        } = self.pipeline.on_frame_error
        {
            if max_consecutive_failures == 0 {
                return Err(ConfigError::Validation(
                    "max_consecutive_failures must be >= 1".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Kind of video source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    GenericUsb,
    Rtsp,
    FileStream,
    ImageDirectory,
}

/// Source identity; the field matching the input type is used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraId {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub rtsp_url: Option<String>,
    #[serde(default)]
    pub filename: Option<PathBuf>,
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraOptions {
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub max_fps: Option<f64>,
    /// Restart an image directory from the beginning when exhausted
    #[serde(default)]
    pub loop_images: bool,
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub input_type: InputType,
    #[serde(default)]
    pub id: CameraId,
    #[serde(default)]
    pub options: CameraOptions,
}

impl CameraConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_document(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        parse_document(content, None)
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{:?}", self.input_type))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.input_type {
            InputType::GenericUsb => {
                if let Some(index) = self.id.index {
                    if index > 100 {
                        return Err(ConfigError::Validation(
                            "Camera index too large (max 100)".to_string(),
                        ));
                    }
                }
            }
            InputType::Rtsp => match &self.id.rtsp_url {
                Some(url) if url.starts_with("rtsp://") || url.starts_with("rtsps://") => {}
                Some(url) => {
                    return Err(ConfigError::Validation(format!(
                        "id.rtsp_url must be an rtsp:// URL, got '{}'",
                        url
                    )))
                }
                None => {
                    return Err(ConfigError::Validation(
                        "rtsp input requires id.rtsp_url".to_string(),
                    ))
                }
            },
            InputType::FileStream => {
                if self.id.filename.is_none() {
                    return Err(ConfigError::Validation(
                        "file_stream input requires id.filename".to_string(),
                    ));
                }
            }
            InputType::ImageDirectory => {
                if self.id.directory.is_none() {
                    return Err(ConfigError::Validation(
                        "image_directory input requires id.directory".to_string(),
                    ));
                }
            }
        }

        if let Some(resolution) = self.options.resolution {
            if resolution.width == 0 || resolution.height == 0 {
                return Err(ConfigError::Validation(
                    "Resolution must be non-zero".to_string(),
                ));
            }
            if resolution.width > 7680 || resolution.height > 4320 {
                return Err(ConfigError::Validation(
                    "Resolution too large (max 8K)".to_string(),
                ));
            }
        }

        if let Some(fps) = self.options.max_fps {
            if !fps.is_finite() || fps <= 0.0 || fps > 120.0 {
                return Err(ConfigError::Validation(
                    "max_fps must be between 0 and 120".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    parse_document(&content, extension.as_deref())
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
}

fn parse_document<T: DeserializeOwned>(content: &str, extension: Option<&str>) -> Result<T> {
    match extension {
        Some("json") => serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
        Some("toml") => toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        _ => {
            // Try JSON first
            if let Ok(config) = serde_json::from_str::<T>(content) {
                return Ok(config);
            }

            // Try TOML
            if let Ok(config) = toml::from_str::<T>(content) {
                return Ok(config);
            }

            // YAML last, its error is the one reported
            serde_yaml::from_str::<T>(content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG_YAML: &str = r#"
endpoint: http://localhost:30101
leak_detector_ids:
  detect_leaks: det_binary
  count_leaks: det_count
  classify_leaks: det_classify
enable_motion_detection: true
"#;

    fn ids() -> LeakDetectorIds {
        LeakDetectorIds {
            detect_leaks: "det_binary".to_string(),
            count_leaks: "det_count".to_string(),
            classify_leaks: "det_classify".to_string(),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = LeakWatchConfig::from_str(CONFIG_YAML).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:30101"));
        assert_eq!(config.leak_detector_ids, ids());
        assert!(config.enable_motion_detection);
        assert_eq!(config.motion_detection_threshold, 0.1);
        assert_eq!(config.pipeline.roi_padding, 0.05);
        assert!(!config.pipeline.parallel_classification);
        assert_eq!(config.pipeline.on_frame_error, FrameErrorPolicy::FailFast);
        assert_eq!(config.inference, InferenceSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_missing_detector_ids() {
        let result = LeakWatchConfig::from_str("endpoint: http://localhost:30101\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_validation_empty_detector_id() {
        let mut config = LeakWatchConfig::new(ids());
        config.leak_detector_ids.count_leaks = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("count_leaks"));
    }

    #[test]
    fn test_config_validation_endpoint_scheme() {
        let mut config = LeakWatchConfig::new(ids());
        config.endpoint = Some("localhost:30101".to_string());
        assert!(config.validate().is_err());
        config.endpoint = Some("https://api.example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_motion_threshold() {
        let mut config = LeakWatchConfig::new(ids());
        config.motion_detection_threshold = -1.0;
        assert!(config.validate().is_err());
        config.motion_detection_threshold = f64::NAN;
        assert!(config.validate().is_err());
        config.motion_detection_threshold = 100.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_padding() {
        let mut config = LeakWatchConfig::new(ids());
        config.pipeline.roi_padding = 0.6;
        assert!(config.validate().is_err());
        config.pipeline.roi_padding = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_poll_settings() {
        let mut config = LeakWatchConfig::new(ids());
        config.inference.poll_backoff = 0.5;
        assert!(config.validate().is_err());

        let mut config = LeakWatchConfig::new(ids());
        config.inference.poll_max_delay_ms = 10;
        assert!(config.validate().is_err());

        let mut config = LeakWatchConfig::new(ids());
        config.inference.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = LeakWatchConfig::new(ids());
        config.inference.wait_secs = 1e20;
        assert!(config.validate().is_err());

        let mut config = LeakWatchConfig::new(ids());
        config.inference.wait_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = LeakWatchConfig::new(ids());
        config.inference.wait_secs = MAX_WAIT_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_skip_transient_policy_parsing() {
        let yaml = r#"
leak_detector_ids:
  detect_leaks: a
  count_leaks: b
  classify_leaks: c
pipeline:
  parallel_classification: true
  on_frame_error:
    policy: skip_transient
    max_consecutive_failures: 3
"#;
        let config = LeakWatchConfig::from_str(yaml).unwrap();
        assert!(config.pipeline.parallel_classification);
        assert_eq!(
            config.pipeline.on_frame_error,
            FrameErrorPolicy::SkipTransient {
                max_retries: 1,
                max_consecutive_failures: 3
            }
        );
    }

    #[test]
    fn test_zero_consecutive_failures_rejected() {
        let mut config = LeakWatchConfig::new(ids());
        config.pipeline.on_frame_error = FrameErrorPolicy::SkipTransient {
            max_retries: 0,
            max_consecutive_failures: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_env_fallback() {
        let mut config = LeakWatchConfig::new(ids());
        config.apply_env_with(|key| {
            assert_eq!(key, ENDPOINT_ENV);
            Some("http://edge:30101".to_string())
        });
        assert_eq!(config.endpoint.as_deref(), Some("http://edge:30101"));

        // A configured endpoint wins over the environment
        config.apply_env_with(|_| Some("http://other:1".to_string()));
        assert_eq!(config.endpoint.as_deref(), Some("http://edge:30101"));

        let mut config = LeakWatchConfig::new(ids());
        config.apply_env_with(|_| Some("   ".to_string()));
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_config_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
enable_motion_detection = true
motion_detection_threshold = 2.5

[leak_detector_ids]
detect_leaks = "a"
count_leaks = "b"
classify_leaks = "c"
"#
        )
        .unwrap();

        let config = LeakWatchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.motion_detection_threshold, 2.5);
        assert_eq!(config.leak_detector_ids.classify_leaks, "c");
    }

    #[test]
    fn test_config_from_file_reports_path() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "leak_detector_ids: [not, a, map]").unwrap();
        let err = LeakWatchConfig::from_file(file.path()).unwrap_err();
        match err {
            ConfigError::Parse(msg) => assert!(msg.contains(".yaml")),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_missing_file() {
        let err = LeakWatchConfig::from_file("/nonexistent/leakwatch.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_shipped_configs_are_valid() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs");
        let config = LeakWatchConfig::from_file(root.join("config.yaml")).unwrap();
        assert!(config.enable_motion_detection);
        assert_eq!(config.pipeline.on_frame_error, FrameErrorPolicy::FailFast);

        let camera = CameraConfig::from_file(root.join("camera.yaml")).unwrap();
        assert_eq!(camera.input_type, InputType::GenericUsb);
        assert_eq!(camera.options.max_fps, Some(15.0));
    }

    #[test]
    fn test_camera_config_usb() {
        let yaml = r#"
name: dock camera
input_type: generic_usb
id:
  index: 1
options:
  resolution:
    width: 1280
    height: 720
"#;
        let config = CameraConfig::from_str(yaml).unwrap();
        assert_eq!(config.input_type, InputType::GenericUsb);
        assert_eq!(config.id.index, Some(1));
        assert_eq!(
            config.options.resolution,
            Some(Resolution {
                width: 1280,
                height: 720
            })
        );
        assert_eq!(config.display_name(), "dock camera");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_camera_config_requires_matching_id() {
        let rtsp = CameraConfig::from_str("input_type: rtsp\n").unwrap();
        assert!(rtsp.validate().is_err());

        let file = CameraConfig::from_str("input_type: file_stream\n").unwrap();
        assert!(file.validate().is_err());

        let dir = CameraConfig::from_str("input_type: image_directory\n").unwrap();
        assert!(dir.validate().is_err());

        let bad_url =
            CameraConfig::from_str("input_type: rtsp\nid:\n  rtsp_url: http://cam\n").unwrap();
        assert!(bad_url.validate().is_err());

        let good_url =
            CameraConfig::from_str("input_type: rtsp\nid:\n  rtsp_url: rtsp://cam/stream\n")
                .unwrap();
        assert!(good_url.validate().is_ok());
    }

    #[test]
    fn test_camera_config_options_validation() {
        let mut config = CameraConfig::from_str("input_type: generic_usb\n").unwrap();
        config.options.resolution = Some(Resolution { width: 0, height: 480 });
        assert!(config.validate().is_err());

        config.options.resolution = Some(Resolution { width: 7681, height: 480 });
        assert!(config.validate().is_err());

        config.options.resolution = None;
        config.options.max_fps = Some(0.0);
        assert!(config.validate().is_err());

        config.options.max_fps = Some(30.0);
        assert!(config.validate().is_ok());
    }
}
