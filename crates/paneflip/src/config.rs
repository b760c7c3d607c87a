//! Runtime configuration.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Command-line flags are applied on top of the file with
//! [`Config::apply_cli`], then [`Config::validate`] checks the result.
//!
//! ```toml
//! backend = "headless"
//! device_dir = "/dev/dri"
//! tick_interval_ms = 1000
//! root_color = "#222288"
//! log_level = "info"
//!
//! [headless]
//! width = 640
//! height = 480
//! dump_dir = "/tmp/frames"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use paneflip_backend::HeadlessConfig;
use paneflip_canvas::Color;
#[cfg(target_os = "linux")]
use paneflip_kms::KmsConfig;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Directory scanned for DRM card nodes unless configured otherwise.
pub const DEFAULT_DEVICE_DIR: &str = "/dev/dri";

/// Which display implementation to drive.
///
/// `kms` parses on every platform but only validates on Linux. Elsewhere
/// the default is `headless`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// DRM/KMS hardware display.
    Kms,
    /// In-memory display, optionally dumping frames to disk.
    Headless,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            Self::Kms
        } else {
            Self::Headless
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kms => "kms",
            Self::Headless => "headless",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeadlessSection {
    pub width: u16,
    pub height: u16,
    pub dump_dir: Option<PathBuf>,
}

impl Default for HeadlessSection {
    fn default() -> Self {
        let d = HeadlessConfig::default();
        Self {
            width: d.width,
            height: d.height,
            dump_dir: d.dump_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: BackendKind,
    /// Directory scanned for the first `card*` node.
    pub device_dir: PathBuf,
    pub tick_interval_ms: u64,
    /// Root pane fill, `#RRGGBB`.
    pub root_color: String,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub headless: HeadlessSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            tick_interval_ms: 1000,
            root_color: "#222288".to_owned(),
            log_level: "info".to_owned(),
            headless: HeadlessSection::default(),
        }
    }
}

impl Config {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// File (if given) plus command-line overrides, validated.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Override file values with any flags given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(backend) = cli.backend {
            self.backend = backend;
        }
        if let Some(ms) = cli.tick_ms {
            self.tick_interval_ms = ms;
        }
        if let Some(dir) = &cli.device_dir {
            self.device_dir.clone_from(dir);
        }
        if let Some(dir) = &cli.dump_dir {
            self.headless.dump_dir = Some(dir.clone());
        }
        if let Some(level) = &cli.log_level {
            self.log_level.clone_from(level);
        }
    }

    /// Check ranges and formats.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.tick_interval_ms == 0 {
            errors.push("tick_interval_ms must be > 0".into());
        }
        if let Err(e) = self.root_color.parse::<Color>() {
            errors.push(format!("root_color {:?}: {e}", self.root_color));
        }
        if self.headless.width == 0 || self.headless.height == 0 {
            errors.push(format!(
                "headless geometry must be non-zero, got {}x{}",
                self.headless.width, self.headless.height
            ));
        }
        if self.backend == BackendKind::Kms && !cfg!(target_os = "linux") {
            errors.push("backend \"kms\" requires Linux DRM; use \"headless\"".into());
        }
        if self.log_level.trim().is_empty() {
            errors.push("log_level must not be empty".into());
        }

        errors
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Parsed root color. Falls back to black only if `validate` was skipped.
    #[must_use]
    pub fn root_color(&self) -> Color {
        self.root_color.parse().unwrap_or(Color::BLACK)
    }

    #[cfg(target_os = "linux")]
    #[must_use]
    pub fn kms(&self) -> KmsConfig {
        KmsConfig {
            device_dir: self.device_dir.clone(),
        }
    }

    #[must_use]
    pub fn headless(&self) -> HeadlessConfig {
        HeadlessConfig {
            width: self.headless.width,
            height: self.headless.height,
            dump_dir: self.headless.dump_dir.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// TOML parse error.
    Toml(toml::de::Error),
    /// One or more values failed validation.
    Invalid(Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            Self::Toml(e) => write!(f, "config TOML error: {e}"),
            Self::Invalid(errors) => write!(f, "invalid config: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Toml(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}
