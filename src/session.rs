//! Session state machine tying capture, compositing and saving together.
//!
//! The controller owns every piece of session state: the frame source, the
//! running capture loop, the template, the frozen capture and the composite.
//! Front ends drive it through four commands (`start_camera`,
//! `stop_camera`, `run_processing`, `save_result`) and call `pump` between
//! commands so missed reads and a dead capture thread turn into status
//! messages. It is also the only thing that reports status text to the
//! presenter.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::camera::{
    CameraError, CaptureLoop, CaptureSettings, DeviceOpener, Frame, FrameSource, LatestFrame,
    MissedReads,
};
use crate::compositor::{self, CompositorError};
use crate::config::Config;
use crate::persistence::{self, ImageWriter, PersistenceError};
use crate::presenter::{Presenter, Surface};

pub const STATUS_STARTED: &str = "Camera started";
pub const STATUS_STOPPED: &str = "Camera stopped";
pub const STATUS_READ_FAILED: &str = "frame read failed";
pub const STATUS_CAPTURE_LOST: &str = "Capture stopped unexpectedly";
pub const STATUS_PROCESSED: &str = "Processing complete";
pub const STATUS_NOT_READY: &str = "Images are not ready";
pub const STATUS_NOTHING_TO_SAVE: &str = "No image to save";

/// Visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Processed,
    Saved,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Capturing => write!(f, "capturing"),
            SessionState::Processed => write!(f, "processed"),
            SessionState::Saved => write!(f, "saved"),
        }
    }
}

/// Errors returned by session commands. Each leaves the session usable.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    DeviceOpen(#[from] CameraError),
    #[error("Images are not ready (template: {}, capture: {})", present(.template), present(.capture))]
    MissingInput { template: bool, capture: bool },
    #[error(transparent)]
    Compositor(#[from] CompositorError),
    #[error("No image to save")]
    NoResult,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

fn present(flag: &bool) -> &'static str {
    if *flag {
        "present"
    } else {
        "missing"
    }
}

/// Static settings for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Camera index handed to the device opener
    pub source_id: u32,
    pub capture: CaptureSettings,
    /// Where `save_result` writes
    pub output: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            source_id: 0,
            capture: CaptureSettings::default(),
            output: PathBuf::from("output.png"),
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            source_id: config.camera.device,
            capture: config.capture_settings(),
            output: config.session.output.clone(),
        }
    }
}

pub struct SessionController {
    state: SessionState,
    settings: SessionSettings,
    /// Parked here while no capture loop runs
    source: Option<FrameSource>,
    capture: Option<CaptureLoop>,
    live: LatestFrame,
    missed: MissedReads,
    presenter: Arc<dyn Presenter>,
    writer: Box<dyn ImageWriter>,
    template: Option<Frame>,
    captured: Option<Frame>,
    composite: Option<Frame>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("capturing", &self.is_capturing())
            .field("has_template", &self.template.is_some())
            .field("has_capture", &self.captured.is_some())
            .field("has_composite", &self.composite.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(
        opener: Box<dyn DeviceOpener>,
        presenter: Arc<dyn Presenter>,
        writer: Box<dyn ImageWriter>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            settings,
            source: Some(FrameSource::new(opener)),
            capture: None,
            live: Arc::new(Mutex::new(None)),
            missed: MissedReads::default(),
            presenter,
            writer,
            template: None,
            captured: None,
            composite: None,
        }
    }

    /// Install the template image. Only the first template sticks; it is
    /// read-only for the rest of the session.
    pub fn with_template(mut self, template: Frame) -> Self {
        self.install_template(template);
        self
    }

    /// Load the template from disk, reporting a status message on failure.
    pub fn load_template(&mut self, path: &Path) -> Result<(), SessionError> {
        if self.template.is_some() {
            log::warn!("Template already loaded, ignoring {}", path.display());
            return Ok(());
        }
        match persistence::load_image(path) {
            Ok(frame) => {
                self.install_template(frame);
                Ok(())
            }
            Err(e) => {
                self.report(&format!("Failed to load template: {}", e));
                Err(e.into())
            }
        }
    }

    fn install_template(&mut self, template: Frame) {
        if self.template.is_some() {
            log::warn!("Template already installed, keeping the first one");
            return;
        }
        log::info!(
            "Template loaded ({}x{}x{})",
            template.width(),
            template.height(),
            template.channels()
        );
        self.template = Some(template);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether a capture loop is live. Independent of `state()`: processing
    /// and saving while the preview runs move the state on without stopping
    /// capture.
    pub fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureLoop::is_running)
    }

    pub fn template(&self) -> Option<&Frame> {
        self.template.as_ref()
    }

    /// Frame frozen by the last `stop_camera`.
    pub fn captured_frame(&self) -> Option<&Frame> {
        self.captured.as_ref()
    }

    pub fn composite(&self) -> Option<&Frame> {
        self.composite.as_ref()
    }

    /// Most recent frame published by the running capture loop.
    pub fn live_frame(&self) -> Option<Frame> {
        self.live.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Open the camera and start the capture loop.
    ///
    /// Does nothing if capture is already running. A capture thread that
    /// died is cleaned up first and capture starts again.
    ///
    /// # Errors
    /// * `SessionError::DeviceOpen` - The device could not be acquired; the
    ///   state is unchanged
    pub fn start_camera(&mut self) -> Result<(), SessionError> {
        if self.is_capturing() {
            log::debug!("start_camera ignored, already capturing");
            return Ok(());
        }
        self.reap_dead_capture();

        let Some(mut source) = self.source.take() else {
            let err = CameraError::DeviceOpen {
                source_id: self.settings.source_id,
                reason: "camera handle was lost".to_string(),
            };
            self.report(&err.to_string());
            return Err(err.into());
        };

        if let Err(e) = source.open(self.settings.source_id) {
            self.source = Some(source);
            self.report(&e.to_string());
            return Err(e.into());
        }

        *self.live.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.missed.store(0, Ordering::Relaxed);
        self.capture = Some(CaptureLoop::start(
            source,
            self.settings.capture,
            Arc::clone(&self.presenter),
            Arc::clone(&self.live),
            Arc::clone(&self.missed),
        ));
        self.state = SessionState::Capturing;
        self.report(STATUS_STARTED);
        Ok(())
    }

    /// Stop capture, release the camera and freeze the last live frame.
    ///
    /// Always succeeds. When no frame arrived since the last stop, the
    /// previously frozen frame is kept.
    pub fn stop_camera(&mut self) {
        self.halt_capture();
        self.state = SessionState::Idle;
        self.report(STATUS_STOPPED);
    }

    /// Stop the loop if any, take the source back, release the device and
    /// freeze the last live frame.
    fn halt_capture(&mut self) {
        if let Some(capture) = self.capture.take() {
            match capture.stop() {
                Some(source) => self.source = Some(source),
                None => log::error!("Capture thread lost the camera handle"),
            }
        }
        if let Some(source) = self.source.as_mut() {
            source.release();
        }

        // Misses from the stopped loop are stale now
        let stale = self.missed.swap(0, Ordering::Relaxed);
        if stale > 0 {
            log::debug!("Discarded {} missed read(s) from stopped loop", stale);
        }

        let frozen = self.live.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(frame) = frozen {
            log::info!("Captured frame frozen ({}x{})", frame.width(), frame.height());
            self.captured = Some(frame);
        }
    }

    /// Clean up after a capture thread that ended on its own.
    fn reap_dead_capture(&mut self) {
        let dead = self
            .capture
            .as_ref()
            .is_some_and(|capture| !capture.is_running());
        if !dead {
            return;
        }
        self.halt_capture();
        if self.state == SessionState::Capturing {
            self.state = SessionState::Idle;
        }
        self.report(STATUS_CAPTURE_LOST);
    }

    /// Composite the frozen capture into the template and move to
    /// `Processed`. A running preview keeps running.
    ///
    /// # Errors
    /// * `SessionError::MissingInput` - Template or captured frame is absent
    /// * `SessionError::Compositor` - The images cannot be composited
    pub fn run_processing(&mut self) -> Result<(), SessionError> {
        let (template, captured) = match (&self.template, &self.captured) {
            (Some(t), Some(c)) => (t, c),
            (t, c) => {
                let err = SessionError::MissingInput {
                    template: t.is_some(),
                    capture: c.is_some(),
                };
                self.report(STATUS_NOT_READY);
                return Err(err);
            }
        };

        log::info!(
            "Template size (HxWxC): {}x{}x{}",
            template.height(),
            template.width(),
            template.channels()
        );
        log::info!(
            "Capture size (HxWxC): {}x{}x{}",
            captured.height(),
            captured.width(),
            captured.channels()
        );

        match compositor::composite(template, captured) {
            Ok(image) => {
                self.presenter.show_frame(Surface::Result, &image);
                self.composite = Some(image);
                self.state = SessionState::Processed;
                self.report(STATUS_PROCESSED);
                Ok(())
            }
            Err(e) => {
                self.report(&format!("Processing failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Write the composite to the configured output path.
    ///
    /// # Errors
    /// * `SessionError::NoResult` - Nothing has been processed yet; no file
    ///   is written
    /// * `SessionError::Persistence` - The write failed; the state is
    ///   unchanged so the save can be retried
    pub fn save_result(&mut self) -> Result<(), SessionError> {
        let Some(image) = &self.composite else {
            self.report(STATUS_NOTHING_TO_SAVE);
            return Err(SessionError::NoResult);
        };

        let output = self.settings.output.clone();
        match self.writer.write(image, &output) {
            Ok(()) => {
                self.state = SessionState::Saved;
                self.report(&format!("Saved: {}", output.display()));
                Ok(())
            }
            Err(e) => {
                self.report(&format!("Save failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Report what the capture thread did since the last call.
    ///
    /// Missed reads collapse into one status message. A capture thread that
    /// died is cleaned up and the session returns to `Idle`. Returns the
    /// number of missed reads.
    pub fn pump(&mut self) -> usize {
        let missed = self.missed.swap(0, Ordering::Relaxed);
        if missed > 0 {
            log::debug!("{} frame read(s) failed", missed);
            self.report(STATUS_READ_FAILED);
        }
        self.reap_dead_capture();
        missed
    }

    fn report(&self, status: &str) {
        log::info!("{}", status);
        self.presenter.show_status(status);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(capture) = self.capture.take() {
            if let Some(mut source) = capture.stop() {
                source.release();
            }
        }
    }
}
