//! Camera capture: frames, devices, and the periodic capture loop.
//!
//! - Frames via [`Frame`]
//! - Device access via [`FrameSource`] and the [`DeviceOpener`] /
//!   [`CameraDevice`] collaborators
//! - Periodic capture via [`CaptureLoop`]

mod capture;
mod capture_loop;
mod device;
mod frame_utils;
#[cfg(feature = "native-camera")]
mod native;
mod source;
mod types;

pub use capture::{CaptureLoop, CaptureSettings, DEFAULT_INTERVAL};
pub use capture_loop::{CancelToken, CaptureWorker, LatestFrame, MissedReads, TickOutcome};
pub use device::{list_devices, CameraDevice, DeviceOpener, StillImageOpener};
pub use frame_utils::{from_rgb_image, mirror_horizontal, to_rgb_image};
#[cfg(feature = "native-camera")]
pub use native::NativeOpener;
pub use source::FrameSource;
pub use types::{CameraError, CameraInfo, DeviceState, Frame, FrameError, PixelOrder, CHANNELS};
