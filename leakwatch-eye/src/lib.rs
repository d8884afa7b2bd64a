//! leakwatch-eye: cascading leak detection over a video stream
//!
//! Frames come from a [`FrameSource`], are optionally gated by a
//! [`MotionDetector`], run through the [`CascadingPipeline`] and end up
//! annotated in a [`DisplaySink`]. The [`FrameLoop`] ties these together.
//!
//! OpenCV capture and windowed display are behind the `opencv` feature; image
//! directories and headless display work without it.

pub mod annotate;
pub mod cascade;
pub mod display;
pub mod error;
pub mod frame;
pub mod frame_loop;
pub mod gate;
pub mod motion;
pub mod roi;
pub mod source;
#[cfg(feature = "opencv")]
pub mod camera;

pub use annotate::{annotate, AnnotatedFrame, Caption};
pub use cascade::{CascadeOutcome, CascadingPipeline};
pub use display::{DisplaySink, HeadlessDisplay};
#[cfg(feature = "opencv")]
pub use display::HighGuiDisplay;
#[cfg(feature = "opencv")]
pub use camera::VideoCaptureSource;
pub use error::VisionError;
pub use frame::Frame;
pub use frame_loop::{FrameLoop, FrameOutcome, LoopReport, LoopState, StopReason};
pub use gate::passes;
pub use motion::{MotionDetector, PixelDiffMotionDetector};
pub use roi::to_pixel_rect;
pub use source::{open_source, FrameSource, ImageDirectorySource};
