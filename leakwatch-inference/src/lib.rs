//! leakwatch-inference: image queries against remote detectors
//!
//! Provides the `InferenceService` abstraction the detection cascade talks to
//! and an HTTP implementation for the Groundlight image-query API (cloud or
//! edge endpoint).

pub mod error;
pub mod providers;
pub mod wire;
pub mod codec;

pub use error::{InferenceError, Result};
pub use providers::{resolve_detectors, GroundlightClient, InferenceService, PollSettings};
pub use codec::encode_jpeg;
