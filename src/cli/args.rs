//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// Live camera preview with a targeting reticle, tiled into a template image
#[derive(Parser, Debug)]
#[command(name = "tilecam")]
#[command(version, about = "Tile camera captures into the white areas of a template", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Interactive session with the default camera
    tilecam --template images/google.png

    # Use a still image instead of a camera
    tilecam --still-image face.png

    # Composite two files without a camera
    tilecam composite -t images/google.png -s capture.png -o output.png")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Camera device index (from list-cameras)
    #[arg(long)]
    pub camera: Option<u32>,

    /// Milliseconds between captured frames
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: Option<u64>,

    /// Template image whose white pixels are replaced
    #[arg(long, short)]
    pub template: Option<PathBuf>,

    /// Where `save` writes the composite
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Serve this image as the camera feed
    #[arg(long)]
    pub still_image: Option<PathBuf>,

    /// Config file path
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}

impl Args {
    /// Override config values with the flags that were given.
    pub fn apply(&self, config: &mut Config) {
        if let Some(camera) = self.camera {
            config.camera.device = camera;
        }
        if let Some(interval) = self.interval_ms {
            config.camera.interval_ms = interval;
        }
        if let Some(still) = &self.still_image {
            config.camera.still_image = Some(still.clone());
        }
        if let Some(template) = &self.template {
            config.session.template = template.clone();
        }
        if let Some(output) = &self.output {
            config.session.output = output.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive capture session (default)
    Run,
    /// Composite an image file into a template without a camera
    Composite {
        /// Template image
        #[arg(long, short)]
        template: PathBuf,
        /// Image tiled into the template's white pixels
        #[arg(long, short)]
        source: PathBuf,
        /// Output PNG path
        #[arg(long, short, default_value = "output.png")]
        output: PathBuf,
    },
    /// List available cameras
    ListCameras,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
