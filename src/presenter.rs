//! The presentation side of a session: whatever shows frames and status text.

use crate::camera::Frame;

/// Which display area a frame is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Live camera preview with the reticle
    Preview,
    /// Compositing result
    Result,
}

/// Receives rendered frames and status strings.
///
/// Preview frames arrive on the capture thread, so implementations must be
/// `Send + Sync`. A presenter only displays; it never hands buffers back.
pub trait Presenter: Send + Sync {
    fn show_frame(&self, surface: Surface, frame: &Frame);

    fn show_status(&self, status: &str);
}
