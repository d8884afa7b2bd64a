//! Normalized region to pixel rectangle conversion

use leakwatch_core::{PixelRect, Roi};

/// Convert a normalized region into a padded pixel rectangle of a `width` x `height` frame.
///
/// Each side is pushed outward by `padding` times the frame dimension, then
/// clamped to the frame and truncated. The result may be degenerate; callers
/// check before cropping.
pub fn to_pixel_rect(roi: &Roi, width: u32, height: u32, padding: f64) -> PixelRect {
    let w = width as f64;
    let h = height as f64;
    let pad_x = padding * w;
    let pad_y = padding * h;

    PixelRect::new(
        clamp_edge(roi.left * w - pad_x, w),
        clamp_edge(roi.top * h - pad_y, h),
        clamp_edge(roi.right * w + pad_x, w),
        clamp_edge(roi.bottom * h + pad_y, h),
    )
}

fn clamp_edge(value: f64, max: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    // Clamp first, truncation happens on the cast
    value.clamp(0.0, max) as u32
}
