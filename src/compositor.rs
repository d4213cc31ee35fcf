//! Tile compositing: paste a source image into the white areas of a template.
//!
//! Every template pixel that is pure white on all channels is replaced with
//! the source pixel at `(y mod source.height, x mod source.width)`, which
//! tiles the source across the template from the top-left corner. All other
//! pixels are copied unchanged. Matching is exact; near-white pixels are
//! left alone.

use thiserror::Error;

use crate::camera::{Frame, PixelOrder, CHANNELS};

/// Channel value that counts as white.
const WHITE: u8 = u8::MAX;

/// Reasons the compositor refuses its inputs. Nothing is produced on error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositorError {
    #[error("template image is empty ({width}x{height})")]
    EmptyTemplate { width: u32, height: u32 },
    #[error("source image is empty ({width}x{height})")]
    EmptySource { width: u32, height: u32 },
    #[error("channel count mismatch: template has {template}, source has {tile}")]
    ChannelMismatch { template: usize, tile: usize },
    #[error("channel order mismatch: template is {template}, source is {tile}")]
    PixelOrderMismatch {
        template: PixelOrder,
        tile: PixelOrder,
    },
}

/// Which template pixels are pure white.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// Mark every pixel whose channels are all 255.
    pub fn white(template: &Frame) -> Self {
        let bits = template
            .data()
            .chunks_exact(CHANNELS)
            .map(|px| px.iter().all(|&c| c == WHITE))
            .collect();
        Self {
            width: template.width(),
            height: template.height(),
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    /// Number of pixels that will be replaced.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }
}

/// Tile `source` into the white pixels of `template`.
///
/// The result always has the template's dimensions and channel order.
///
/// # Errors
/// * `CompositorError::EmptyTemplate` / `EmptySource` - zero width or height
/// * `CompositorError::ChannelMismatch` / `PixelOrderMismatch` - the two
///   images do not share the same pixel layout
pub fn composite(template: &Frame, source: &Frame) -> Result<Frame, CompositorError> {
    validate(template, source)?;

    let mask = Mask::white(template);
    let width = template.width() as usize;
    let src_width = source.width() as usize;
    let src_height = source.height() as usize;
    let src_stride = source.stride();
    let src = source.data();

    let mut out = template.data().to_vec();
    for (y, row) in out.chunks_exact_mut(template.stride()).enumerate() {
        let src_row = &src[(y % src_height) * src_stride..][..src_stride];
        let mask_row = &mask.bits[y * width..][..width];
        for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
            if mask_row[x] {
                let sx = (x % src_width) * CHANNELS;
                px.copy_from_slice(&src_row[sx..sx + CHANNELS]);
            }
        }
    }

    log::debug!(
        "Composited {}x{} source into {}x{} template ({} pixels replaced)",
        source.width(),
        source.height(),
        template.width(),
        template.height(),
        mask.count()
    );

    template.with_data(out).map_err(|_| CompositorError::EmptyTemplate {
        width: template.width(),
        height: template.height(),
    })
}

fn validate(template: &Frame, source: &Frame) -> Result<(), CompositorError> {
    if template.is_empty() {
        return Err(CompositorError::EmptyTemplate {
            width: template.width(),
            height: template.height(),
        });
    }
    if source.is_empty() {
        return Err(CompositorError::EmptySource {
            width: source.width(),
            height: source.height(),
        });
    }
    if template.channels() != source.channels() {
        return Err(CompositorError::ChannelMismatch {
            template: template.channels(),
            tile: source.channels(),
        });
    }
    if template.order() != source.order() {
        return Err(CompositorError::PixelOrderMismatch {
            template: template.order(),
            tile: source.order(),
        });
    }
    Ok(())
}
