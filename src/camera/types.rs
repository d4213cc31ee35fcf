//! Frame and device types shared by the capture pipeline.

use std::fmt;
use std::time::Instant;

use thiserror::Error;

/// Number of color channels every frame carries.
pub const CHANNELS: usize = 3;

/// Channel order of the bytes in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelOrder {
    /// Red, green, blue
    #[default]
    Rgb,
    /// Blue, green, red
    Bgr,
}

impl PixelOrder {
    /// Lay out an RGB triple in this channel order.
    pub fn arrange(self, rgb: [u8; 3]) -> [u8; 3] {
        match self {
            PixelOrder::Rgb => rgb,
            PixelOrder::Bgr => [rgb[2], rgb[1], rgb[0]],
        }
    }
}

impl fmt::Display for PixelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelOrder::Rgb => write!(f, "RGB"),
            PixelOrder::Bgr => write!(f, "BGR"),
        }
    }
}

/// A rectangular, tightly packed 3-channel pixel buffer.
///
/// Frames are immutable once built. Pipeline stages produce a new frame
/// instead of editing one in place.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    order: PixelOrder,
    timestamp: Instant,
}

impl Frame {
    /// Wrap a tightly packed buffer.
    ///
    /// # Errors
    /// * `FrameError::BufferLength` - If `data.len() != width * height * 3`
    pub fn new(data: Vec<u8>, width: u32, height: u32, order: PixelOrder) -> Result<Self, FrameError> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(FrameError::BufferLength {
                expected,
                got: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            order,
            timestamp: Instant::now(),
        })
    }

    /// Build a frame from rows that may carry trailing padding bytes.
    ///
    /// Drivers often align rows to a larger stride; the padding is dropped so
    /// the resulting frame is tightly packed.
    pub fn from_padded_rows(
        data: &[u8],
        width: u32,
        height: u32,
        stride: usize,
        order: PixelOrder,
    ) -> Result<Self, FrameError> {
        let too_large = || FrameError::TooLarge { width, height };
        let row_len = (width as usize)
            .checked_mul(CHANNELS)
            .ok_or_else(too_large)?;
        if stride < row_len {
            return Err(FrameError::Stride { stride, row_len });
        }
        let needed = match height as usize {
            0 => 0,
            h => stride
                .checked_mul(h - 1)
                .and_then(|n| n.checked_add(row_len))
                .ok_or_else(too_large)?,
        };
        if data.len() < needed {
            return Err(FrameError::BufferLength {
                expected: needed,
                got: data.len(),
            });
        }

        let packed = super::frame_utils::pack_rows(data, row_len, height as usize, stride);
        Self::new(packed, width, height, order)
    }

    /// Solid-color frame, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, FrameError> {
        let len = expected_len(width, height)?;
        let data = rgb.iter().copied().cycle().take(len).collect();
        Self::new(data, width, height, PixelOrder::Rgb)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Always 3.
    pub fn channels(&self) -> usize {
        CHANNELS
    }

    /// Bytes per row. Frames are tightly packed, so this is `width * channels`.
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    pub fn order(&self) -> PixelOrder {
        self.order
    }

    /// When the frame was produced.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Channel bytes of the pixel at (x, y), or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = y as usize * self.stride() + x as usize * CHANNELS;
        Some(&self.data[start..start + CHANNELS])
    }

    /// Same pixels, new buffer contents. Keeps dimensions and order.
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Result<Self, FrameError> {
        Self::new(data, self.width, self.height, self.order)
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize, FrameError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or(FrameError::TooLarge { width, height })
}

/// Errors raised while building a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame buffer holds {got} bytes, expected {expected}")]
    BufferLength { expected: usize, got: usize },
    #[error("row stride {stride} is shorter than a {row_len}-byte row")]
    Stride { stride: usize, row_len: usize },
    #[error("frame dimensions {width}x{height} overflow the address space")]
    TooLarge { width: u32, height: u32 },
}

/// Whether a device handle is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Closed,
    Open,
}

/// Information about an available camera device.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Device index for selection
    pub index: u32,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.description)
    }
}

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The device could not be acquired
    #[error("Failed to open camera {source_id}: {reason}")]
    DeviceOpen { source_id: u32, reason: String },
    /// Failed to query camera devices
    #[error("Failed to query cameras: {0}")]
    Query(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_length() {
        let err = Frame::new(vec![0; 5], 1, 2, PixelOrder::Rgb).unwrap_err();
        assert_eq!(err, FrameError::BufferLength { expected: 6, got: 5 });
    }

    #[test]
    fn test_frame_allows_zero_size() {
        let frame = Frame::new(Vec::new(), 0, 4, PixelOrder::Rgb).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.stride(), 0);
    }

    #[test]
    fn test_frame_pixel_lookup() {
        let frame = Frame::new((0..12).collect(), 2, 2, PixelOrder::Rgb).unwrap();
        assert_eq!(frame.pixel(1, 0), Some(&[3, 4, 5][..]));
        assert_eq!(frame.pixel(0, 1), Some(&[6, 7, 8][..]));
        assert_eq!(frame.pixel(2, 0), None);
        assert_eq!(frame.stride(), 6);
        assert_eq!(frame.channels(), 3);
    }

    #[test]
    fn test_frame_from_padded_rows() {
        // 1x2 frame with two padding bytes per row
        let data = [1, 2, 3, 0, 0, 4, 5, 6];
        let frame = Frame::from_padded_rows(&data, 1, 2, 5, PixelOrder::Bgr).unwrap();
        assert_eq!(frame.data(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(frame.order(), PixelOrder::Bgr);
    }

    #[test]
    fn test_frame_from_padded_rows_short_stride() {
        let err = Frame::from_padded_rows(&[0; 12], 2, 2, 4, PixelOrder::Rgb).unwrap_err();
        assert_eq!(err, FrameError::Stride { stride: 4, row_len: 6 });
    }

    #[test]
    fn test_frame_from_padded_rows_huge_stride() {
        let err = Frame::from_padded_rows(&[0; 6], 1, 3, usize::MAX / 2, PixelOrder::Rgb)
            .unwrap_err();
        assert_eq!(err, FrameError::TooLarge { width: 1, height: 3 });
    }

    #[test]
    fn test_frame_from_padded_rows_short_buffer() {
        let err = Frame::from_padded_rows(&[0; 7], 1, 2, 5, PixelOrder::Rgb).unwrap_err();
        assert_eq!(err, FrameError::BufferLength { expected: 8, got: 7 });
    }

    #[test]
    fn test_filled_frame() {
        let frame = Frame::filled(2, 1, [9, 8, 7]).unwrap();
        assert_eq!(frame.data(), &[9, 8, 7, 9, 8, 7]);
    }

    #[test]
    fn test_pixel_order_arrange() {
        assert_eq!(PixelOrder::Rgb.arrange([1, 2, 3]), [1, 2, 3]);
        assert_eq!(PixelOrder::Bgr.arrange([1, 2, 3]), [3, 2, 1]);
    }

    #[test]
    fn test_camera_info_display() {
        let info = CameraInfo {
            index: 0,
            name: "Test Camera".to_string(),
            description: "Built-in".to_string(),
        };
        assert_eq!(format!("{}", info), "[0] Test Camera (Built-in)");
    }

    #[test]
    fn test_camera_error_display() {
        let err = CameraError::DeviceOpen {
            source_id: 2,
            reason: "busy".to_string(),
        };
        assert_eq!(format!("{}", err), "Failed to open camera 2: busy");
        assert_eq!(
            format!("{}", CameraError::Query("no backend".to_string())),
            "Failed to query cameras: no backend"
        );
    }
}
