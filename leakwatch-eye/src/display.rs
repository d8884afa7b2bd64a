//! Display sinks for annotated frames

use crate::annotate::AnnotatedFrame;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Receives each annotated frame and reports whether the user asked to quit
pub trait DisplaySink: Send {
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<()>;

    /// Checked once after every shown frame
    fn quit_requested(&mut self) -> bool;
}

/// Logs captions instead of opening a window; quits on Ctrl-C
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    quit: Arc<AtomicBool>,
    frames_shown: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag that makes `quit_requested` return true once set
    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        self.quit.clone()
    }

    /// Set the quit flag when the process receives Ctrl-C.
    ///
    /// Must be called from within a tokio runtime.
    pub fn quit_on_ctrl_c(&self) {
        let quit = self.quit.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after the current frame");
                quit.store(true, Ordering::SeqCst);
            }
        });
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl DisplaySink for HeadlessDisplay {
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<()> {
        self.frames_shown += 1;
        for caption in &frame.captions {
            info!("{} at ({}, {})", caption.text, caption.x, caption.y);
        }
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "opencv")]
pub use window::HighGuiDisplay;

#[cfg(feature = "opencv")]
mod window {
    use super::DisplaySink;
    use crate::annotate::AnnotatedFrame;
    use crate::camera::rgb_to_mat;
    use crate::error::{Result, VisionError};
    use opencv::{
        core::{Point, Scalar},
        highgui, imgproc,
    };

    pub const WINDOW_NAME: &str = "Frame";
    const QUIT_KEY: i32 = 'q' as i32;

    /// OpenCV window; `q` quits
    pub struct HighGuiDisplay {
        window: String,
        last_key: i32,
    }

    impl HighGuiDisplay {
        pub fn new() -> Self {
            Self {
                window: WINDOW_NAME.to_string(),
                last_key: -1,
            }
        }
    }

    impl Default for HighGuiDisplay {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DisplaySink for HighGuiDisplay {
        fn show(&mut self, frame: &AnnotatedFrame) -> Result<()> {
            let mut mat = rgb_to_mat(&frame.image)?;
            let green = Scalar::new(0.0, 255.0, 0.0, 0.0);
            for caption in &frame.captions {
                imgproc::put_text(
                    &mut mat,
                    &caption.text,
                    Point::new(caption.x, caption.y),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    0.5,
                    green,
                    2,
                    imgproc::LINE_8,
                    false,
                )?;
            }

            highgui::imshow(&self.window, &mat)
                .map_err(|e| VisionError::Display(format!("imshow failed: {}", e)))?;
            self.last_key = highgui::wait_key(1)?;
            Ok(())
        }

        fn quit_requested(&mut self) -> bool {
            self.last_key & 0xFF == QUIT_KEY
        }
    }

    impl Drop for HighGuiDisplay {
        fn drop(&mut self) {
            let _ = highgui::destroy_all_windows();
        }
    }
}
