//! Reading and writing image files.

use std::path::{Path, PathBuf};

use image::ImageFormat;
use thiserror::Error;

use crate::camera::{from_rgb_image, to_rgb_image, Frame};

/// Errors that can occur while loading or saving images.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to encode {}: {message}", .path.display())]
    Encode { path: PathBuf, message: String },
    #[error("failed to decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes finished images somewhere durable.
pub trait ImageWriter: Send {
    fn write(&self, frame: &Frame, path: &Path) -> Result<(), PersistenceError>;
}

/// Saves frames as PNG files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngWriter;

impl ImageWriter for PngWriter {
    fn write(&self, frame: &Frame, path: &Path) -> Result<(), PersistenceError> {
        let image = to_rgb_image(frame).ok_or_else(|| PersistenceError::Encode {
            path: path.to_path_buf(),
            message: format!(
                "buffer does not match {}x{} dimensions",
                frame.width(),
                frame.height()
            ),
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| match e {
                image::ImageError::IoError(source) => PersistenceError::Io {
                    path: path.to_path_buf(),
                    source,
                },
                other => PersistenceError::Encode {
                    path: path.to_path_buf(),
                    message: other.to_string(),
                },
            })?;

        log::info!(
            "Saved {}x{} image to {}",
            frame.width(),
            frame.height(),
            path.display()
        );
        Ok(())
    }
}

/// Load an image file as an RGB frame. The format is detected from the file.
pub fn load_image(path: &Path) -> Result<Frame, PersistenceError> {
    let decoded = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(source) => PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => PersistenceError::Decode {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    })?;

    from_rgb_image(decoded.to_rgb8()).map_err(|e| PersistenceError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PixelOrder;

    #[test]
    fn test_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        let frame = Frame::new((0..18).collect(), 3, 2, PixelOrder::Rgb).unwrap();

        PngWriter.write(&frame, &path).unwrap();
        let loaded = load_image(&path).unwrap();

        assert_eq!(loaded.width(), 3);
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.data(), frame.data());
    }

    #[test]
    fn test_bgr_frame_saved_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bgr.png");
        let frame = Frame::new(vec![1, 2, 3], 1, 1, PixelOrder::Bgr).unwrap();

        PngWriter.write(&frame, &path).unwrap();
        assert_eq!(load_image(&path).unwrap().data(), &[3, 2, 1]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_image(Path::new("/nonexistent/template.png")).unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }

    #[test]
    fn test_load_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Decode { .. }));
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let frame = Frame::filled(1, 1, [0, 0, 0]).unwrap();

        assert!(PngWriter.write(&frame, &blocker.join("out.png")).is_err());
    }
}
