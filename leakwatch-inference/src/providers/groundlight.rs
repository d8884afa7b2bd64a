use async_trait::async_trait;
use crate::codec::encode_jpeg;
use crate::error::{InferenceError, Result};
use crate::providers::trait_impl::InferenceService;
use crate::wire::{DetectorBody, ImageQueryBody};
use image::RgbImage;
use leakwatch_core::{DetectionQuery, Detector, InferenceSettings, MAX_WAIT_SECS};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Public service endpoint, used when none is configured
pub const DEFAULT_ENDPOINT: &str = "https://api.groundlight.ai/device-api";

const API_TOKEN_HEADER: &str = "x-api-token";
const API_PATH: &str = "device-api";
const MAX_ERROR_BODY: usize = 500;

/// Backoff schedule for waiting on a confident answer
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub wait: Duration,
    pub initial_delay: Duration,
    pub backoff: f64,
    pub max_delay: Duration,
}

impl PollSettings {
    pub fn from_settings(settings: &InferenceSettings) -> Self {
        Self {
            wait: Duration::try_from_secs_f64(settings.wait_secs.clamp(0.0, MAX_WAIT_SECS))
                .unwrap_or(Duration::ZERO),
            initial_delay: Duration::from_millis(settings.poll_initial_delay_ms),
            backoff: settings.poll_backoff.max(1.0),
            max_delay: Duration::from_millis(settings.poll_max_delay_ms),
        }
    }

    /// Return the first answer without polling
    pub fn disabled() -> Self {
        Self {
            wait: Duration::ZERO,
            initial_delay: Duration::from_millis(200),
            backoff: 1.0,
            max_delay: Duration::from_millis(200),
        }
    }

    /// Grow the delay by the backoff factor, never past `max_delay`
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Normalize an endpoint URL to the API base.
///
/// A bare host gets the API path appended; a trailing slash is dropped.
pub fn sanitize_endpoint(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint)
        .map_err(|e| InferenceError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(InferenceError::InvalidEndpoint(format!(
            "{}: scheme must be http or https",
            endpoint
        )));
    }

    let trimmed = endpoint.trim_end_matches('/');
    if url.path().is_empty() || url.path() == "/" {
        Ok(format!("{}/{}", trimmed, API_PATH))
    } else {
        Ok(trimmed.to_string())
    }
}

/// HTTP client for the Groundlight image-query API
pub struct GroundlightClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    poll: PollSettings,
}

impl GroundlightClient {
    pub fn new(
        endpoint: Option<&str>,
        api_token: Option<String>,
        settings: &InferenceSettings,
    ) -> Result<Self> {
        let base_url = match endpoint {
            Some(endpoint) => sanitize_endpoint(endpoint)?,
            None => DEFAULT_ENDPOINT.to_string(),
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_token: api_token.filter(|t| !t.is_empty()),
            poll: PollSettings::from_settings(settings),
        })
    }

    /// Build a client reading the API token from the configured environment variable
    pub fn from_settings(endpoint: Option<&str>, settings: &InferenceSettings) -> Result<Self> {
        let api_token = std::env::var(&settings.api_token_env).ok();
        if api_token.is_none() {
            debug!(
                "{} is not set, sending requests without an API token",
                settings.api_token_env
            );
        }
        Self::new(endpoint, api_token, settings)
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_token(&self) -> bool {
        self.api_token.is_some()
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.header(API_TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn fetch_image_query(&self, image_query_id: &str) -> Result<ImageQueryBody> {
        let url = format!("{}/v1/image-queries/{}", self.base_url, image_query_id);
        let response = self.authorized(self.client.get(&url)).send().await?;
        read_json(response, || {
            InferenceError::InvalidResponse(format!("image query {} not found", image_query_id))
        })
        .await
    }

    /// Poll until the answer is confident, processing is done or the wait elapses
    async fn wait_for_confident(&self, mut image_query: ImageQueryBody, threshold: f64) -> Result<ImageQueryBody> {
        if self.poll.wait.is_zero() || image_query.is_settled(threshold) {
            return Ok(image_query);
        }

        let deadline = Instant::now() + self.poll.wait;
        let mut delay = self.poll.initial_delay;
        while !image_query.is_settled(threshold) {
            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "Image query {} not confident after {:?}, using latest answer",
                    image_query.id, self.poll.wait
                );
                break;
            }
            tokio::time::sleep(delay.min(deadline - now)).await;
            image_query = self.fetch_image_query(&image_query.id).await?;
            delay = self.poll.next_delay(delay);
        }

        Ok(image_query)
    }
}

#[async_trait]
impl InferenceService for GroundlightClient {
    async fn get_detector(&self, detector_id: &str) -> Result<Detector> {
        let url = format!("{}/v1/detectors/{}", self.base_url, detector_id);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let body: DetectorBody = read_json(response, || {
            InferenceError::DetectorNotFound(detector_id.to_string())
        })
        .await?;
        Ok(Detector::from(body))
    }

    async fn submit_image_query(&self, detector: &Detector, image: &RgbImage) -> Result<DetectionQuery> {
        let payload = encode_jpeg(image)?;
        debug!(
            "Submitting {}x{} image ({} bytes) to detector {}",
            image.width(),
            image.height(),
            payload.len(),
            detector.id
        );

        let url = format!("{}/v1/image-queries", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .query(&[("detector_id", detector.id.as_str()), ("want_async", "false")])
            .header(CONTENT_TYPE, "image/jpeg")
            .body(payload)
            .send()
            .await?;
        let image_query: ImageQueryBody = read_json(response, || {
            InferenceError::DetectorNotFound(detector.id.clone())
        })
        .await?;

        let threshold = image_query.threshold_or(detector.confidence_threshold);
        let image_query = self.wait_for_confident(image_query, threshold).await?;
        Ok(image_query.into_query(detector))
    }
}

async fn read_json<T, F>(response: Response, not_found: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> InferenceError,
{
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(InferenceError::AuthenticationFailed)
        }
        StatusCode::TOO_MANY_REQUESTS => return Err(InferenceError::RateLimit),
        StatusCode::NOT_FOUND => return Err(not_found()),
        _ => {}
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message: String = text.chars().take(MAX_ERROR_BODY).collect();
        if status.is_server_error() {
            return Err(InferenceError::ServiceUnavailable {
                status: status.as_u16(),
                message,
            });
        }
        return Err(InferenceError::InvalidResponse(format!(
            "HTTP {}: {}",
            status, message
        )));
    }

    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
