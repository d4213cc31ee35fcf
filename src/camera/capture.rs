//! Capture loop handle and public API.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::capture_loop::{CancelToken, CaptureCommand, CaptureWorker, LatestFrame, MissedReads};
use super::source::FrameSource;
use crate::presenter::Presenter;
use crate::reticle::Reticle;

/// Default tick interval (~33 fps).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30);

/// Settings for a capture loop.
#[derive(Debug, Clone, Copy)]
pub struct CaptureSettings {
    /// Time between ticks
    pub interval: Duration,
    /// Overlay drawn on every frame
    pub reticle: Reticle,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            reticle: Reticle::default(),
        }
    }
}

/// A running capture loop.
///
/// The loop runs on a background thread that owns the `FrameSource` until
/// `stop()` hands it back. Every tick reads one frame, draws the reticle,
/// stores the result in the shared latest-frame slot and shows it on the
/// presenter's preview surface. Ticks never overlap.
pub struct CaptureLoop {
    /// Capture thread handle
    capture_thread: Option<JoinHandle<FrameSource>>,
    /// Channel to send commands to capture thread
    command_tx: Option<Sender<CaptureCommand>>,
    /// Delivery gate shared with the capture thread
    cancel: CancelToken,
    settings: CaptureSettings,
}

impl std::fmt::Debug for CaptureLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLoop")
            .field("settings", &self.settings)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CaptureLoop {
    /// Start ticking on a background thread.
    ///
    /// `source` should already be open; reads from a closed source simply
    /// fail and are counted in `missed`.
    pub fn start(
        source: FrameSource,
        settings: CaptureSettings,
        presenter: Arc<dyn Presenter>,
        latest: LatestFrame,
        missed: MissedReads,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let worker = CaptureWorker::new(
            source,
            settings.reticle,
            presenter,
            latest,
            missed,
            cancel.clone(),
        );
        let interval = settings.interval;

        let handle = thread::spawn(move || worker.run(rx, interval));
        log::info!("Capture loop started ({:?} interval)", interval);

        Self {
            capture_thread: Some(handle),
            command_tx: Some(tx),
            cancel,
            settings,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Stop the loop and take the frame source back.
    ///
    /// Once this returns no further frame is delivered, including one that
    /// was being processed when it was called. Returns `None` only if the
    /// capture thread panicked, in which case the source is gone.
    pub fn stop(mut self) -> Option<FrameSource> {
        self.shutdown()
    }

    /// Check if the capture thread is currently running.
    pub fn is_running(&self) -> bool {
        self.capture_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn shutdown(&mut self) -> Option<FrameSource> {
        // Close the gate first so an in-flight frame is dropped
        self.cancel.cancel();

        // Wake the thread if it is waiting for the next tick
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(CaptureCommand::Stop);
        }

        let handle = self.capture_thread.take()?;
        match handle.join() {
            Ok(source) => {
                log::info!("Capture loop stopped");
                Some(source)
            }
            Err(_) => {
                log::error!("Capture thread panicked; camera handle lost");
                None
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if let Some(mut source) = self.shutdown() {
            source.release();
        }
    }
}
