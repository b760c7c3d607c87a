use std::path::PathBuf;

use clap::Parser;

use crate::config::BackendKind;

/// Minimal display server: named panes rotated onto one display, driven by
/// text commands on stdin.
#[derive(Debug, Parser)]
#[command(name = "paneflip", version)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Display backend.
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Milliseconds between two rotation ticks.
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Directory holding DRM device nodes.
    #[arg(long, value_name = "DIR")]
    pub device_dir: Option<PathBuf>,

    /// Write every headless frame to this directory.
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. `debug`, `paneflip.rotation=trace`).
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}
