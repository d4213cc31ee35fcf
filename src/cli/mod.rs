//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, the console presenter,
//! and subcommand handlers.

mod args;
mod commands;
mod console;

pub use args::{Args, Command, ConfigAction};
pub use commands::{
    composite_files, device_opener, handle_config_action, list_cameras, write_default_config,
};
pub use console::ConsolePresenter;
