//! Console presenter: prints status lines and keeps the latest preview.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::camera::Frame;
use crate::presenter::{Presenter, Surface};

/// A terminal cannot show video, so preview frames are counted and the most
/// recent one is kept for `snapshot`.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    previews: AtomicU64,
    last_preview: Mutex<Option<Frame>>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of preview frames shown so far.
    pub fn preview_count(&self) -> u64 {
        self.previews.load(Ordering::Relaxed)
    }

    /// Most recent preview frame, if any.
    pub fn last_preview(&self) -> Option<Frame> {
        self.last_preview
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Presenter for ConsolePresenter {
    fn show_frame(&self, surface: Surface, frame: &Frame) {
        match surface {
            Surface::Preview => {
                self.previews.fetch_add(1, Ordering::Relaxed);
                *self.last_preview.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame.clone());
            }
            Surface::Result => {
                println!(
                    "Result image ready ({}x{}, {} channels)",
                    frame.width(),
                    frame.height(),
                    frame.channels()
                );
            }
        }
    }

    fn show_status(&self, status: &str) {
        println!("> {}", status);
    }
}
