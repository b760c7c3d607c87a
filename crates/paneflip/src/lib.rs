#![forbid(unsafe_code)]

//! paneflip: a minimal display server for one display.
//!
//! Named panes are drawn by text commands on stdin and shown one at a time,
//! in rotation, on a DRM/KMS display or an in-memory one. This crate holds
//! the process around the core crates: command-line and file configuration,
//! logging, the command protocol and loop, signal handling and lifecycle.
//! The core is re-exported below for embedding.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod serve;
pub mod signals;

use clap::Parser;

pub use cli::Cli;
pub use config::{BackendKind, Config};
pub use error::{AppError, Result};

// --- Core re-exports -------------------------------------------------------

pub use paneflip_backend::{BufferPair, DisplayBackend, HeadlessBackend, HeadlessConfig};
pub use paneflip_canvas::{
    Bezier2, Canvas, CanvasLayout, Circle, Color, Line, Rect, RectCopy, Triangle,
};
#[cfg(target_os = "linux")]
pub use paneflip_kms::{KmsBackend, KmsConfig};
pub use paneflip_runtime::{CancellationSource, PaneError, PaneManager};

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli)?;
    logging::init(&config.log_level)?;
    serve::run_config(&config)
}
