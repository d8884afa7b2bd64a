//! Frame sources

use crate::error::{Result, VisionError};
use crate::frame::Frame;
use async_trait::async_trait;
use leakwatch_core::{CameraConfig, InputType};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Produces frames in acquisition order
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame; `VisionError::EndOfStream` once the source is exhausted
    async fn grab(&mut self) -> Result<Frame>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

/// Replays the images of a directory, in file name order
pub struct ImageDirectorySource {
    name: String,
    files: Vec<PathBuf>,
    position: usize,
    loop_images: bool,
}

impl ImageDirectorySource {
    pub fn open(directory: impl AsRef<Path>, loop_images: bool) -> Result<Self> {
        let directory = directory.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(VisionError::Camera(format!(
                "No images found in {}",
                directory.display()
            )));
        }

        info!("Replaying {} images from {}", files.len(), directory.display());
        Ok(Self {
            name: directory.display().to_string(),
            files,
            position: 0,
            loop_images,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FrameSource for ImageDirectorySource {
    async fn grab(&mut self) -> Result<Frame> {
        if self.position >= self.files.len() {
            if !self.loop_images {
                return Err(VisionError::EndOfStream);
            }
            self.position = 0;
        }

        let path = self.files[self.position].clone();
        self.position += 1;
        debug!("Loading frame from {}", path.display());

        let image = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| VisionError::Processing(format!("Image loader task failed: {}", e)))??;
        Ok(Frame::new(image.to_rgb8()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Open the source described by a camera configuration
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    config.validate()?;
    match config.input_type {
        InputType::ImageDirectory => {
            let directory = config
                .id
                .directory
                .as_ref()
                .ok_or_else(|| VisionError::Config("image_directory input requires id.directory".to_string()))?;
            Ok(Box::new(ImageDirectorySource::open(directory, config.options.loop_images)?))
        }
        #[cfg(feature = "opencv")]
        InputType::GenericUsb | InputType::Rtsp | InputType::FileStream => {
            Ok(Box::new(crate::camera::VideoCaptureSource::open(config)?))
        }
        #[cfg(not(feature = "opencv"))]
        other => Err(VisionError::Config(format!(
            "{:?} input requires leakwatch to be built with the `opencv` feature",
            other
        ))),
    }
}
