//! Subcommand handlers for composite, list-cameras and config actions.

use std::error::Error;
use std::path::Path;

use super::args::ConfigAction;
use crate::camera::{self, CameraError, DeviceOpener, StillImageOpener};
use crate::compositor;
use crate::config::{default_path as get_config_path, Config};
use crate::persistence::{load_image, ImageWriter, PngWriter};

/// Pick the device backend for a session.
///
/// A configured still image wins; otherwise the native webcam backend is used
/// when compiled in.
pub fn device_opener(config: &Config) -> Box<dyn DeviceOpener> {
    if let Some(path) = &config.camera.still_image {
        return Box::new(StillImageOpener::new(path));
    }
    native_opener()
}

#[cfg(feature = "native-camera")]
fn native_opener() -> Box<dyn DeviceOpener> {
    Box::new(camera::NativeOpener)
}

#[cfg(not(feature = "native-camera"))]
fn native_opener() -> Box<dyn DeviceOpener> {
    Box::new(NoBackend)
}

/// Stand-in when no camera backend is available; every open fails.
#[cfg(not(feature = "native-camera"))]
struct NoBackend;

#[cfg(not(feature = "native-camera"))]
impl DeviceOpener for NoBackend {
    fn open(&mut self, source_id: u32) -> Result<Box<dyn camera::CameraDevice>, CameraError> {
        Err(CameraError::DeviceOpen {
            source_id,
            reason: "no camera backend; rebuild with --features native-camera or set --still-image"
                .to_string(),
        })
    }
}

/// Composite `source` into `template` and write the result as PNG.
pub fn composite_files(template: &Path, source: &Path, output: &Path) -> Result<(), Box<dyn Error>> {
    let template_img = load_image(template)?;
    let source_img = load_image(source)?;

    println!(
        "Template size (H, W, C): ({}, {}, {})",
        template_img.height(),
        template_img.width(),
        template_img.channels()
    );
    println!(
        "Source size (H, W, C): ({}, {}, {})",
        source_img.height(),
        source_img.width(),
        source_img.channels()
    );

    let result = compositor::composite(&template_img, &source_img)?;
    PngWriter.write(&result, output)?;

    println!("Done: saved composite to '{}'", output.display());
    Ok(())
}

/// List available cameras and print them to stdout.
pub fn list_cameras() -> Result<(), CameraError> {
    let devices = camera::list_devices()?;
    if devices.is_empty() {
        println!("No cameras found.");
        println!();
        println!("Make sure your camera is connected and permissions are granted.");
    } else {
        println!("Available cameras:");
        for device in devices {
            println!("  {}", device);
        }
        println!();
        println!("Use --camera <index> to select a camera.");
    }
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, config: &Config) -> Result<(), Box<dyn Error>> {
    let config_path = get_config_path();
    match action {
        ConfigAction::Show => {
            println!("{}", config.to_toml()?);
            if config_path.exists() {
                println!("# Config file: {} (exists)", config_path.display());
            } else {
                println!("# Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init => {
            write_default_config(&config_path)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}

/// Write the default configuration to `path`, refusing to overwrite.
pub fn write_default_config(path: &Path) -> Result<(), Box<dyn Error>> {
    if path.exists() {
        return Err(format!(
            "Config file already exists: {} (use 'tilecam config show' to view it)",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let body = Config::default().to_toml()?;
    std::fs::write(path, format!("# tilecam configuration\n\n{}", body))?;
    Ok(())
}
