//! Frame conversion and transformation utilities.

use image::RgbImage;

use super::types::{Frame, FrameError, PixelOrder, CHANNELS};

/// Copy `height` rows of `row_len` bytes out of a buffer laid out with `stride`.
pub(crate) fn pack_rows(data: &[u8], row_len: usize, height: usize, stride: usize) -> Vec<u8> {
    let mut packed = Vec::with_capacity(row_len * height);
    for y in 0..height {
        let start = y * stride;
        packed.extend_from_slice(&data[start..start + row_len]);
    }
    packed
}

/// Mirror a frame horizontally (flip left-right).
///
/// Returns a new frame; the input is left untouched.
pub fn mirror_horizontal(frame: &Frame) -> Frame {
    let width = frame.width() as usize;
    if frame.is_empty() {
        return frame.clone();
    }
    let mut data = frame.data().to_vec();

    for row in data.chunks_exact_mut(width * CHANNELS) {
        // Swap pixels from left and right
        for x in 0..width / 2 {
            let left = x * CHANNELS;
            let right = (width - 1 - x) * CHANNELS;
            for i in 0..CHANNELS {
                row.swap(left + i, right + i);
            }
        }
    }

    // Same length as the input buffer, so this cannot fail
    frame.with_data(data).unwrap_or_else(|_| frame.clone())
}

/// Convert a decoded RGB image into a frame.
pub fn from_rgb_image(image: RgbImage) -> Result<Frame, FrameError> {
    let (width, height) = image.dimensions();
    Frame::new(image.into_raw(), width, height, PixelOrder::Rgb)
}

/// Convert a frame into an RGB image, swapping channels for BGR frames.
pub fn to_rgb_image(frame: &Frame) -> Option<RgbImage> {
    let data = match frame.order() {
        PixelOrder::Rgb => frame.data().to_vec(),
        PixelOrder::Bgr => frame
            .data()
            .chunks_exact(CHANNELS)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
    };
    RgbImage::from_raw(frame.width(), frame.height(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame::new(data, width, height, PixelOrder::Rgb).unwrap()
    }

    #[test]
    fn test_mirror_horizontal_2x1() {
        // Simple 2x1 image: pixel A (R=1,G=2,B=3) and pixel B (R=4,G=5,B=6)
        let mirrored = mirror_horizontal(&frame(vec![1, 2, 3, 4, 5, 6], 2, 1));
        assert_eq!(mirrored.data(), &[4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn test_mirror_horizontal_3x2() {
        // Row 0: [A, B, C]
        // Row 1: [D, E, F]
        let input = frame(
            vec![
                1, 1, 1, 2, 2, 2, 3, 3, 3, //
                4, 4, 4, 5, 5, 5, 6, 6, 6,
            ],
            3,
            2,
        );
        let mirrored = mirror_horizontal(&input);
        assert_eq!(
            mirrored.data(),
            &[
                3, 3, 3, 2, 2, 2, 1, 1, 1, //
                6, 6, 6, 5, 5, 5, 4, 4, 4,
            ]
        );
        // Input is unchanged
        assert_eq!(input.data()[0], 1);
    }

    #[test]
    fn test_mirror_horizontal_single_pixel() {
        let mirrored = mirror_horizontal(&frame(vec![1, 2, 3], 1, 1));
        assert_eq!(mirrored.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_pack_rows_drops_padding() {
        let data = [1, 2, 9, 3, 4, 9];
        assert_eq!(pack_rows(&data, 2, 2, 3), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_to_rgb_image_swaps_bgr() {
        let bgr = Frame::new(vec![10, 20, 30], 1, 1, PixelOrder::Bgr).unwrap();
        let image = to_rgb_image(&bgr).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn test_from_rgb_image() {
        let image = RgbImage::from_raw(2, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let converted = from_rgb_image(image).unwrap();
        assert_eq!(converted.width(), 2);
        assert_eq!(converted.height(), 1);
        assert_eq!(converted.pixel(1, 0), Some(&[4, 5, 6][..]));
    }
}
