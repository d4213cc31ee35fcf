//! Device collaborators: how a `FrameSource` acquires and reads a camera.

use std::path::{Path, PathBuf};

use super::types::{CameraError, CameraInfo, Frame};
use crate::persistence;

/// An opened capture device.
///
/// Implementations hold the OS handle. A `FrameSource` owns exactly one of
/// these at a time and never shares it.
pub trait CameraDevice: Send {
    /// Read one frame. `None` means this read failed; the next one may succeed.
    fn read(&mut self) -> Option<Frame>;

    /// Give the handle back to the OS. Called at most once per device.
    fn release(&mut self);
}

/// Acquires devices by numeric source id.
pub trait DeviceOpener: Send {
    fn open(&mut self, source_id: u32) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// Serves a still image as if it were a camera.
///
/// Handy on machines without a webcam: every read returns the same frame.
/// The file is decoded once per `open`.
#[derive(Debug, Clone)]
pub struct StillImageOpener {
    path: PathBuf,
}

impl StillImageOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceOpener for StillImageOpener {
    fn open(&mut self, source_id: u32) -> Result<Box<dyn CameraDevice>, CameraError> {
        let frame = persistence::load_image(&self.path).map_err(|e| CameraError::DeviceOpen {
            source_id,
            reason: e.to_string(),
        })?;
        log::info!(
            "Serving still image {} ({}x{}) as camera {}",
            self.path.display(),
            frame.width(),
            frame.height(),
            source_id
        );
        Ok(Box::new(StillImageDevice { frame: Some(frame) }))
    }
}

struct StillImageDevice {
    frame: Option<Frame>,
}

impl CameraDevice for StillImageDevice {
    fn read(&mut self) -> Option<Frame> {
        self.frame.clone()
    }

    fn release(&mut self) {
        self.frame = None;
    }
}

/// List all available camera devices on the system.
///
/// If no cameras are found, returns an empty vector (not an error).
#[cfg(feature = "native-camera")]
pub fn list_devices() -> Result<Vec<CameraInfo>, CameraError> {
    use nokhwa::query;
    use nokhwa::utils::ApiBackend;

    let devices = query(ApiBackend::Auto).map_err(|e| CameraError::Query(e.to_string()))?;

    Ok(devices
        .into_iter()
        .map(|d| CameraInfo {
            index: d.index().as_index().unwrap_or(0),
            name: d.human_name(),
            description: d.description().to_string(),
        })
        .collect())
}

/// List all available camera devices on the system.
#[cfg(not(feature = "native-camera"))]
pub fn list_devices() -> Result<Vec<CameraInfo>, CameraError> {
    Err(CameraError::Query(
        "built without the `native-camera` feature".to_string(),
    ))
}
