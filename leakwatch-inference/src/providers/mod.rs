pub mod trait_impl;
pub mod groundlight;

pub use trait_impl::{resolve_detectors, InferenceService};
pub use groundlight::{sanitize_endpoint, GroundlightClient, PollSettings, DEFAULT_ENDPOINT};
