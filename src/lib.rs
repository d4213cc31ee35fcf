//! tilecam library crate.
//!
//! Camera capture with a reticle overlay, and a compositor that tiles the
//! captured frame into the white areas of a template image.

pub mod camera;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod event_loop;
pub mod persistence;
pub mod presenter;
pub mod reticle;
pub mod session;
