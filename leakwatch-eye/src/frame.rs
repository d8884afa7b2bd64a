//! Captured frames

use image::{imageops, RgbImage};
use leakwatch_core::PixelRect;

/// One RGB frame owned by a single loop iteration
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Copy out the pixels inside `rect`.
    ///
    /// Returns `None` for a degenerate rectangle or one that does not fit the frame.
    pub fn crop(&self, rect: &PixelRect) -> Option<RgbImage> {
        if rect.is_degenerate() || !rect.fits_within(self.width(), self.height()) {
            return None;
        }
        Some(imageops::crop_imm(&self.image, rect.left, rect.top, rect.width(), rect.height()).to_image())
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}
