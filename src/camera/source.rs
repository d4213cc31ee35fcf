//! Exclusive owner of the capture device.

use super::device::{CameraDevice, DeviceOpener};
use super::types::{CameraError, DeviceState, Frame};

/// Opens, reads and releases one camera device.
///
/// The device handle lives here and nowhere else. While capture runs the
/// whole source is moved onto the capture thread, so there is never more
/// than one reader.
pub struct FrameSource {
    opener: Box<dyn DeviceOpener>,
    device: Option<Box<dyn CameraDevice>>,
    source_id: Option<u32>,
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("state", &self.state())
            .field("source_id", &self.source_id)
            .finish_non_exhaustive()
    }
}

impl FrameSource {
    pub fn new(opener: Box<dyn DeviceOpener>) -> Self {
        Self {
            opener,
            device: None,
            source_id: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        if self.device.is_some() {
            DeviceState::Open
        } else {
            DeviceState::Closed
        }
    }

    /// Id of the currently open device.
    pub fn source_id(&self) -> Option<u32> {
        self.source_id
    }

    /// Acquire the device. An already open device is released first.
    ///
    /// # Errors
    /// * `CameraError::DeviceOpen` - If the device cannot be acquired; the
    ///   source stays closed
    pub fn open(&mut self, source_id: u32) -> Result<(), CameraError> {
        self.release();

        let device = self.opener.open(source_id)?;
        self.device = Some(device);
        self.source_id = Some(source_id);
        log::info!("Opened camera {}", source_id);
        Ok(())
    }

    /// Read one frame.
    ///
    /// Returns `None` when the device is closed or the read failed. Drivers
    /// drop frames now and then, so a miss is not an error.
    pub fn read_frame(&mut self) -> Option<Frame> {
        let device = self.device.as_mut()?;
        device.read()
    }

    /// Release the device. Safe to call repeatedly or before `open`.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            log::info!("Released camera {}", self.source_id.unwrap_or_default());
        }
        self.source_id = None;
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingOpener {
        releases: Arc<AtomicUsize>,
        fail: bool,
    }

    struct CountingDevice {
        releases: Arc<AtomicUsize>,
        reads: usize,
    }

    impl DeviceOpener for CountingOpener {
        fn open(&mut self, source_id: u32) -> Result<Box<dyn CameraDevice>, CameraError> {
            if self.fail {
                return Err(CameraError::DeviceOpen {
                    source_id,
                    reason: "no such device".to_string(),
                });
            }
            Ok(Box::new(CountingDevice {
                releases: Arc::clone(&self.releases),
                reads: 0,
            }))
        }
    }

    impl CameraDevice for CountingDevice {
        fn read(&mut self) -> Option<Frame> {
            self.reads += 1;
            // Every other read misses
            if self.reads % 2 == 0 {
                None
            } else {
                Frame::filled(2, 2, [0, 0, 0]).ok()
            }
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn source(fail: bool) -> (FrameSource, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let opener = CountingOpener {
            releases: Arc::clone(&releases),
            fail,
        };
        (FrameSource::new(Box::new(opener)), releases)
    }

    #[test]
    fn test_read_before_open_returns_none() {
        let (mut source, _) = source(false);
        assert_eq!(source.state(), DeviceState::Closed);
        assert!(source.read_frame().is_none());
    }

    #[test]
    fn test_open_failure_stays_closed() {
        let (mut source, _) = source(true);
        let err = source.open(7).unwrap_err();
        assert!(matches!(err, CameraError::DeviceOpen { source_id: 7, .. }));
        assert_eq!(source.state(), DeviceState::Closed);
        assert_eq!(source.source_id(), None);
    }

    #[test]
    fn test_transient_read_failure() {
        let (mut source, _) = source(false);
        source.open(0).unwrap();
        assert!(source.read_frame().is_some());
        assert!(source.read_frame().is_none());
        assert!(source.read_frame().is_some());
        assert_eq!(source.state(), DeviceState::Open);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut source, releases) = source(false);
        source.release();
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        source.open(0).unwrap();
        source.release();
        source.release();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(source.state(), DeviceState::Closed);
    }

    #[test]
    fn test_drop_releases_device() {
        let (mut source, releases) = source(false);
        source.open(0).unwrap();
        drop(source);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
