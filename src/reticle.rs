//! Targeting reticle drawn over live frames.
//!
//! The reticle is two concentric rings and a cross centered on the frame.
//! After drawing, the frame is mirrored horizontally so the preview behaves
//! like a mirror for the person in front of the camera.

use thiserror::Error;

use crate::camera::{mirror_horizontal, Frame, CHANNELS};
use crate::config::ReticleConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReticleError {
    #[error("cannot draw a reticle on a {width}x{height} frame")]
    InvalidInput { width: u32, height: u32 },
}

/// Reticle geometry and color. Stateless; `draw` is a pure function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reticle {
    pub inner_radius: u32,
    pub outer_radius: u32,
    /// Full length of each cross arm, centered on the frame center
    pub arm_length: u32,
    /// Stroke width in pixels
    pub thickness: u32,
    /// Stroke color as RGB
    pub color: [u8; 3],
}

impl Default for Reticle {
    fn default() -> Self {
        Self {
            inner_radius: 30,
            outer_radius: 60,
            arm_length: 160,
            thickness: 3,
            color: [255, 0, 0],
        }
    }
}

impl From<&ReticleConfig> for Reticle {
    fn from(config: &ReticleConfig) -> Self {
        Self {
            inner_radius: config.inner_radius,
            outer_radius: config.outer_radius,
            arm_length: config.arm_length,
            thickness: config.thickness,
            color: config.color,
        }
    }
}

impl Reticle {
    /// Draw the reticle at the frame center, then mirror the result.
    ///
    /// # Errors
    /// * `ReticleError::InvalidInput` - If the frame has zero width or height
    pub fn draw(&self, frame: &Frame) -> Result<Frame, ReticleError> {
        if frame.is_empty() {
            return Err(ReticleError::InvalidInput {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let mut canvas = Canvas {
            data: frame.data().to_vec(),
            width: i64::from(frame.width()),
            height: i64::from(frame.height()),
            color: frame.order().arrange(self.color),
        };
        let cx = canvas.width / 2;
        let cy = canvas.height / 2;

        canvas.ring(cx, cy, self.inner_radius, self.thickness);
        canvas.ring(cx, cy, self.outer_radius, self.thickness);

        let half_arm = i64::from(self.arm_length / 2);
        let (lo, hi) = stroke_span(self.thickness);
        // Vertical arm
        canvas.fill_rect(cx + lo, cy - half_arm, cx + hi, cy + half_arm);
        // Horizontal arm
        canvas.fill_rect(cx - half_arm, cy + lo, cx + half_arm, cy + hi);

        let drawn = frame
            .with_data(canvas.data)
            .map_err(|_| ReticleError::InvalidInput {
                width: frame.width(),
                height: frame.height(),
            })?;
        Ok(mirror_horizontal(&drawn))
    }
}

/// Offsets covered by a stroke of `thickness` pixels around its center line.
fn stroke_span(thickness: u32) -> (i64, i64) {
    let t = i64::from(thickness.max(1));
    (-(t / 2), (t - 1) / 2)
}

struct Canvas {
    data: Vec<u8>,
    width: i64,
    height: i64,
    color: [u8; 3],
}

impl Canvas {
    fn put(&mut self, x: i64, y: i64) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let start = (y * self.width + x) as usize * CHANNELS;
        self.data[start..start + CHANNELS].copy_from_slice(&self.color);
    }

    /// Inclusive rectangle, clipped to the canvas.
    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64) {
        for y in y0.max(0)..=y1.min(self.height - 1) {
            for x in x0.max(0)..=x1.min(self.width - 1) {
                self.put(x, y);
            }
        }
    }

    /// Annulus of the given stroke width centered on `radius`.
    fn ring(&mut self, cx: i64, cy: i64, radius: u32, thickness: u32) {
        let half = f64::from(thickness.max(1)) / 2.0;
        let r = f64::from(radius);
        let inner = (r - half).max(0.0);
        let outer = r + half;
        let (inner_sq, outer_sq) = (inner * inner, outer * outer);
        let reach = outer.ceil() as i64;

        for y in (cy - reach).max(0)..=(cy + reach).min(self.height - 1) {
            for x in (cx - reach).max(0)..=(cx + reach).min(self.width - 1) {
                let (dx, dy) = ((x - cx) as f64, (y - cy) as f64);
                let d_sq = dx * dx + dy * dy;
                if d_sq >= inner_sq && d_sq <= outer_sq {
                    self.put(x, y);
                }
            }
        }
    }
}
