//! OpenCV video capture: USB cameras, RTSP streams and video files

use crate::error::{Result, VisionError};
use crate::frame::Frame;
use crate::source::FrameSource;
use async_trait::async_trait;
use image::RgbImage;
use leakwatch_core::{CameraConfig, InputType};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Frame source backed by an OpenCV `VideoCapture`.
///
/// Reads block, so each grab runs on the blocking pool.
pub struct VideoCaptureSource {
    name: String,
    capture: Arc<Mutex<VideoCapture>>,
}

impl VideoCaptureSource {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let name = config.display_name();
        let mut capture = match config.input_type {
            InputType::GenericUsb => {
                let index = config.id.index.unwrap_or(0);
                VideoCapture::new(index as i32, CAP_ANY)
                    .map_err(|e| VisionError::Camera(format!("Failed to open camera {}: {}", index, e)))?
            }
            InputType::Rtsp => {
                let url = config
                    .id
                    .rtsp_url
                    .as_deref()
                    .ok_or_else(|| VisionError::Config("rtsp input requires id.rtsp_url".to_string()))?;
                VideoCapture::from_file(url, CAP_ANY)
                    .map_err(|e| VisionError::Camera(format!("Failed to open stream {}: {}", name, e)))?
            }
            InputType::FileStream => {
                let filename = config
                    .id
                    .filename
                    .as_ref()
                    .ok_or_else(|| VisionError::Config("file_stream input requires id.filename".to_string()))?;
                VideoCapture::from_file(&filename.to_string_lossy(), CAP_ANY).map_err(|e| {
                    VisionError::Camera(format!("Failed to open {}: {}", filename.display(), e))
                })?
            }
            InputType::ImageDirectory => {
                return Err(VisionError::Config(
                    "image_directory input is not a video capture".to_string(),
                ))
            }
        };

        if !capture
            .is_opened()
            .map_err(|e| VisionError::Camera(format!("{} not opened: {}", name, e)))?
        {
            return Err(VisionError::Camera(format!("{} failed to open", name)));
        }

        if let Some(resolution) = config.options.resolution {
            capture
                .set(CAP_PROP_FRAME_WIDTH, resolution.width as f64)
                .map_err(|e| VisionError::Camera(format!("Failed to set width: {}", e)))?;
            capture
                .set(CAP_PROP_FRAME_HEIGHT, resolution.height as f64)
                .map_err(|e| VisionError::Camera(format!("Failed to set height: {}", e)))?;
        }
        if let Some(fps) = config.options.max_fps {
            if !capture.set(CAP_PROP_FPS, fps).unwrap_or(false) {
                warn!("{} ignored the requested frame rate {}", name, fps);
            }
        }

        info!("Opened {:?} source {}", config.input_type, name);
        Ok(Self {
            name,
            capture: Arc::new(Mutex::new(capture)),
        })
    }
}

#[async_trait]
impl FrameSource for VideoCaptureSource {
    async fn grab(&mut self) -> Result<Frame> {
        let capture = self.capture.clone();
        tokio::task::spawn_blocking(move || {
            let mut capture = capture.lock();
            let mut mat = Mat::default();
            if !capture.read(&mut mat)? || mat.empty() {
                return Err(VisionError::EndOfStream);
            }
            mat_to_rgb(&mat).map(Frame::new)
        })
        .await
        .map_err(|e| VisionError::Camera(format!("Capture task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Convert a BGR `Mat` into an owned RGB image
pub fn mat_to_rgb(mat: &Mat) -> Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb.data_bytes()?.to_vec();
    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| VisionError::Processing(format!("Frame buffer does not match {}x{}", width, height)))
}

/// Convert an RGB image into a BGR `Mat` for OpenCV drawing and display
pub fn rgb_to_mat(image: &RgbImage) -> Result<Mat> {
    let flat = Mat::from_slice(image.as_raw())?;
    let rgb = flat.reshape(3, image.height() as i32)?.try_clone()?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}
