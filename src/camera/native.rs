//! Webcam backend built on nokhwa.
//!
//! nokhwa camera handles are not `Send` on every platform, so the camera is
//! opened and read on a dedicated thread. The `CameraDevice` handed to the
//! frame source only talks to that thread over channels.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::device::{CameraDevice, DeviceOpener};
use super::types::{CameraError, Frame, PixelOrder};

/// How long a single read may wait on the camera thread.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Requested capture size; the camera picks the closest it supports.
const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const REQUESTED_FPS: u32 = 30;

/// Commands sent to the camera thread.
enum CameraCommand {
    Read(Sender<Option<Frame>>),
    Stop,
}

/// Opens webcams by index through the platform's native capture API.
#[derive(Debug, Default)]
pub struct NativeOpener;

impl DeviceOpener for NativeOpener {
    fn open(&mut self, source_id: u32) -> Result<Box<dyn CameraDevice>, CameraError> {
        let (tx, rx) = mpsc::channel();
        let (info_tx, info_rx) = mpsc::channel::<Result<(), CameraError>>();

        let handle = thread::Builder::new()
            .name(format!("camera-{}", source_id))
            .spawn(move || run_camera_thread(source_id, rx, info_tx))
            .map_err(|e| CameraError::DeviceOpen {
                source_id,
                reason: e.to_string(),
            })?;

        // Wait for the thread to report success or failure
        match info_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(NativeDevice {
                command_tx: Some(tx),
                thread: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CameraError::DeviceOpen {
                    source_id,
                    reason: "camera thread terminated unexpectedly".to_string(),
                })
            }
        }
    }
}

struct NativeDevice {
    command_tx: Option<Sender<CameraCommand>>,
    thread: Option<JoinHandle<()>>,
}

impl CameraDevice for NativeDevice {
    fn read(&mut self) -> Option<Frame> {
        let tx = self.command_tx.as_ref()?;
        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(CameraCommand::Read(reply_tx)).ok()?;
        reply_rx.recv_timeout(READ_TIMEOUT).ok().flatten()
    }

    fn release(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(CameraCommand::Stop);
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NativeDevice {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_camera_thread(
    source_id: u32,
    rx: Receiver<CameraCommand>,
    info_tx: Sender<Result<(), CameraError>>,
) {
    let index = CameraIndex::Index(source_id);

    let mut camera = match open_camera_with_fallback(&index, source_id) {
        Ok(cam) => cam,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(CameraError::DeviceOpen {
            source_id,
            reason: e.to_string(),
        }));
        return;
    }

    let res = camera.resolution();
    log::info!(
        "Camera {} streaming at {}x{} @ {} fps",
        source_id,
        res.width(),
        res.height(),
        camera.frame_rate()
    );
    let _ = info_tx.send(Ok(()));

    while let Ok(CameraCommand::Read(reply)) = rx.recv() {
        let frame = camera
            .frame()
            .ok()
            .and_then(|buffer| buffer.decode_image::<RgbFormat>().ok())
            .and_then(|decoded| {
                // nokhwa links its own `image` version, so go through raw bytes
                let (width, height) = (decoded.width(), decoded.height());
                Frame::new(decoded.into_raw(), width, height, PixelOrder::Rgb).ok()
            });
        let _ = reply.send(frame);
    }

    let _ = camera.stop_stream();
    log::info!("Camera {} released", source_id);
}

/// Try to open a camera with multiple format fallback strategies.
fn open_camera_with_fallback(index: &CameraIndex, source_id: u32) -> Result<Camera, CameraError> {
    let resolution = nokhwa::utils::Resolution::new(REQUESTED_WIDTH, REQUESTED_HEIGHT);
    let format_attempts = [
        // MJPEG is widely supported and cheap over USB
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            NokhwaFrameFormat::MJPEG,
            REQUESTED_FPS,
        ))),
        // Native macOS format
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            NokhwaFrameFormat::NV12,
            REQUESTED_FPS,
        ))),
        // Let the camera pick whatever works
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = String::from("no capture format accepted");
    for requested in format_attempts {
        match Camera::new(index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(CameraError::DeviceOpen {
        source_id,
        reason: last_error,
    })
}
