//! Drawing detections onto a frame copy

use crate::frame::Frame;
use image::{Rgb, RgbImage};
use leakwatch_core::{Detection, PixelRect};

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 2;
/// Captions sit this many pixels above the box
pub const CAPTION_OFFSET: i32 = 10;

/// Text to render next to a box, anchored at its bottom-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

/// A frame copy with boxes drawn in and captions left for the display to render
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub image: RgbImage,
    pub captions: Vec<Caption>,
}

impl AnnotatedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Copy the frame and draw a box plus a `Leak: <label>` caption per detection
pub fn annotate(frame: &Frame, detections: &[Detection]) -> AnnotatedFrame {
    let mut image = frame.image().clone();
    let mut captions = Vec::with_capacity(detections.len());

    for detection in detections {
        draw_rect(&mut image, &detection.rect, BOX_COLOR, BOX_THICKNESS);
        captions.push(Caption {
            text: format!("Leak: {}", detection.label),
            x: detection.rect.left as i32,
            y: detection.rect.top as i32 - CAPTION_OFFSET,
        });
    }

    AnnotatedFrame { image, captions }
}

/// Draw a rectangle border, growing inward with thickness
fn draw_rect(img: &mut RgbImage, rect: &PixelRect, color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    if rect.is_degenerate() || w == 0 || h == 0 {
        return;
    }
    // Right and bottom edges are exclusive
    let x0 = rect.left;
    let y0 = rect.top;
    let x1 = rect.right.saturating_sub(1).min(w - 1);
    let y1 = rect.bottom.saturating_sub(1).min(h - 1);

    for t in 0..thickness {
        let xx0 = x0.saturating_add(t);
        let yy0 = y0.saturating_add(t);
        let xx1 = x1.saturating_sub(t);
        let yy1 = y1.saturating_sub(t);
        if xx0 >= w || yy0 >= h || xx0 > xx1 || yy0 > yy1 {
            continue;
        }
        for x in xx0..=xx1 {
            img.put_pixel(x, yy0, color);
            img.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            img.put_pixel(xx0, y, color);
            img.put_pixel(xx1, y, color);
        }
    }
}
