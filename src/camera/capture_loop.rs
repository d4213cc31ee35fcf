//! Background capture thread implementation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::source::FrameSource;
use super::types::Frame;
use crate::presenter::{Presenter, Surface};
use crate::reticle::Reticle;

/// Slot holding the most recent live frame. Written by the capture thread,
/// read by the session controller; each access swaps the whole frame.
pub type LatestFrame = Arc<Mutex<Option<Frame>>>;

/// Commands sent to the capture thread.
pub enum CaptureCommand {
    Stop,
}

/// Failed reads not yet reported. The capture thread adds to it and the
/// session controller takes it back to zero, so nothing queues up.
pub type MissedReads = Arc<AtomicUsize>;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Delivered,
    ReadFailed,
    /// Cancelled before or during the tick; nothing was delivered
    Cancelled,
}

/// Gate that every delivery passes through.
///
/// Delivery happens while holding the lock, so once `cancel` returns no
/// delivery can start, and one already running has finished.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<Mutex<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `deliver` unless cancelled. Returns whether it ran.
    pub fn deliver(&self, deliver: impl FnOnce()) -> bool {
        let cancelled = self.cancelled.lock().unwrap_or_else(|e| e.into_inner());
        if *cancelled {
            return false;
        }
        deliver();
        true
    }
}

/// Everything one capture thread owns.
pub struct CaptureWorker {
    source: FrameSource,
    reticle: Reticle,
    presenter: Arc<dyn Presenter>,
    latest: LatestFrame,
    missed: MissedReads,
    cancel: CancelToken,
}

impl CaptureWorker {
    pub fn new(
        source: FrameSource,
        reticle: Reticle,
        presenter: Arc<dyn Presenter>,
        latest: LatestFrame,
        missed: MissedReads,
        cancel: CancelToken,
    ) -> Self {
        Self {
            source,
            reticle,
            presenter,
            latest,
            missed,
            cancel,
        }
    }

    /// Read one frame, draw the reticle, and publish the result.
    pub fn tick(&mut self) -> TickOutcome {
        if self.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }

        let frame = match self.source.read_frame() {
            Some(raw) => match self.reticle.draw(&raw) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    log::warn!("Discarding unusable frame: {}", e);
                    None
                }
            },
            None => None,
        };

        let Some(frame) = frame else {
            log::warn!("Frame read failed");
            let missed = &self.missed;
            let reported = self.cancel.deliver(|| {
                missed.fetch_add(1, Ordering::Relaxed);
            });
            return if reported {
                TickOutcome::ReadFailed
            } else {
                TickOutcome::Cancelled
            };
        };

        let latest = &self.latest;
        let presenter = &self.presenter;
        let delivered = self.cancel.deliver(|| {
            presenter.show_frame(Surface::Preview, &frame);
            *latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
        });

        if delivered {
            TickOutcome::Delivered
        } else {
            log::debug!("Dropping frame captured during cancellation");
            TickOutcome::Cancelled
        }
    }

    /// Tick every `interval` until told to stop, then hand the source back.
    ///
    /// Ticks that fall behind are skipped rather than replayed. A tick that
    /// panics ends the loop; the source is still handed back.
    pub fn run(mut self, rx: Receiver<CaptureCommand>, interval: Duration) -> FrameSource {
        let mut next_tick = Instant::now();

        loop {
            let wait = next_tick.saturating_duration_since(Instant::now());
            let command = if wait.is_zero() {
                match rx.try_recv() {
                    Ok(cmd) => Some(cmd),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => Some(CaptureCommand::Stop),
                }
            } else {
                match rx.recv_timeout(wait) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => Some(CaptureCommand::Stop),
                }
            };
            if let Some(CaptureCommand::Stop) = command {
                break;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
                Ok(TickOutcome::Cancelled) => break,
                Ok(_) => {}
                Err(_) => {
                    log::error!("Capture tick panicked, stopping capture loop");
                    break;
                }
            }

            next_tick += interval;
            let now = Instant::now();
            if next_tick < now {
                next_tick = now + interval;
            }
        }

        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraDevice, CameraError, DeviceOpener};
    use std::collections::VecDeque;
    use std::sync::mpsc;

    struct ScriptedOpener(Option<VecDeque<Option<Frame>>>);

    struct ScriptedDevice(VecDeque<Option<Frame>>);

    impl DeviceOpener for ScriptedOpener {
        fn open(&mut self, _source_id: u32) -> Result<Box<dyn CameraDevice>, CameraError> {
            let script = self.0.take().unwrap_or_default();
            Ok(Box::new(ScriptedDevice(script)))
        }
    }

    impl CameraDevice for ScriptedDevice {
        fn read(&mut self) -> Option<Frame> {
            self.0.pop_front().flatten()
        }

        fn release(&mut self) {}
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Surface, u32, u32)>>);

    impl Presenter for Recorder {
        fn show_frame(&self, surface: Surface, frame: &Frame) {
            self.0
                .lock()
                .unwrap()
                .push((surface, frame.width(), frame.height()));
        }

        fn show_status(&self, _status: &str) {}
    }

    fn worker(
        script: Vec<Option<Frame>>,
    ) -> (CaptureWorker, Arc<Recorder>, LatestFrame, MissedReads, CancelToken) {
        let mut source = FrameSource::new(Box::new(ScriptedOpener(Some(script.into()))));
        source.open(0).unwrap();
        let recorder = Arc::new(Recorder::default());
        let latest: LatestFrame = Arc::new(Mutex::new(None));
        let missed = MissedReads::default();
        let cancel = CancelToken::new();
        let worker = CaptureWorker::new(
            source,
            Reticle::default(),
            Arc::clone(&recorder) as Arc<dyn Presenter>,
            Arc::clone(&latest),
            Arc::clone(&missed),
            cancel.clone(),
        );
        (worker, recorder, latest, missed, cancel)
    }

    #[test]
    fn test_tick_delivers_frame() {
        let frame = Frame::filled(8, 6, [0, 0, 0]).unwrap();
        let (mut worker, recorder, latest, missed, _) = worker(vec![Some(frame)]);

        assert_eq!(worker.tick(), TickOutcome::Delivered);
        assert_eq!(*recorder.0.lock().unwrap(), vec![(Surface::Preview, 8, 6)]);
        assert!(latest.lock().unwrap().is_some());
        assert_eq!(missed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tick_read_failure_is_reported() {
        let (mut worker, recorder, latest, missed, _) = worker(vec![None, None]);

        assert_eq!(worker.tick(), TickOutcome::ReadFailed);
        assert_eq!(worker.tick(), TickOutcome::ReadFailed);
        // Repeated misses collapse into one counter
        assert_eq!(missed.load(Ordering::SeqCst), 2);
        assert!(recorder.0.lock().unwrap().is_empty());
        assert!(latest.lock().unwrap().is_none());
    }

    #[test]
    fn test_tick_after_cancel_delivers_nothing() {
        let frame = Frame::filled(4, 4, [0, 0, 0]).unwrap();
        let (mut worker, recorder, latest, missed, cancel) = worker(vec![Some(frame), None]);

        cancel.cancel();
        assert_eq!(worker.tick(), TickOutcome::Cancelled);
        assert_eq!(worker.tick(), TickOutcome::Cancelled);
        assert!(recorder.0.lock().unwrap().is_empty());
        assert!(latest.lock().unwrap().is_none());
        assert_eq!(missed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_latest_frame_wins() {
        let first = Frame::filled(2, 2, [1, 1, 1]).unwrap();
        let second = Frame::filled(3, 3, [2, 2, 2]).unwrap();
        let (mut worker, _, latest, _, _) = worker(vec![Some(first), Some(second)]);

        worker.tick();
        worker.tick();
        assert_eq!(latest.lock().unwrap().as_ref().map(Frame::width), Some(3));
    }

    #[test]
    fn test_run_returns_source_on_stop() {
        let (worker, _, _, _, _) = worker(Vec::new());
        let (tx, rx) = mpsc::channel();
        tx.send(CaptureCommand::Stop).unwrap();

        let source = worker.run(rx, Duration::from_millis(5));
        assert_eq!(source.state(), crate::camera::DeviceState::Open);
    }

    #[test]
    fn test_run_survives_panicking_device() {
        struct PanickingOpener;
        struct PanickingDevice;

        impl DeviceOpener for PanickingOpener {
            fn open(&mut self, _source_id: u32) -> Result<Box<dyn CameraDevice>, CameraError> {
                Ok(Box::new(PanickingDevice))
            }
        }

        impl CameraDevice for PanickingDevice {
            fn read(&mut self) -> Option<Frame> {
                panic!("driver crashed");
            }

            fn release(&mut self) {}
        }

        let mut source = FrameSource::new(Box::new(PanickingOpener));
        source.open(1).unwrap();
        let worker = CaptureWorker::new(
            source,
            Reticle::default(),
            Arc::new(Recorder::default()) as Arc<dyn Presenter>,
            Arc::new(Mutex::new(None)),
            MissedReads::default(),
            CancelToken::new(),
        );
        let (_tx, rx) = mpsc::channel();

        // Ends on its own without a Stop command and still hands the source back
        let source = worker.run(rx, Duration::from_millis(1));
        assert_eq!(source.source_id(), Some(1));
    }

    #[test]
    fn test_cancel_token_deliver() {
        let token = CancelToken::new();
        let mut ran = false;
        assert!(token.deliver(|| ran = true));
        assert!(ran);

        token.cancel();
        assert!(token.is_cancelled());
        assert!(!token.deliver(|| panic!("must not run")));
    }
}
