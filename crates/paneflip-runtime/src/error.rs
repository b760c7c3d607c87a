#![forbid(unsafe_code)]

//! Errors reported by the pane manager and its rotation thread.

use std::fmt;
use std::io;

use paneflip_canvas::{CanvasError, DumpError};

// ── Pane operations ──────────────────────────────────────────────────────

/// Recoverable failure of a single pane operation.
///
/// The `Display` strings are part of the command protocol's replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneError {
    /// A pane with this name already exists.
    Duplicate,
    /// The canvas for a new pane could not be allocated.
    OutOfMemory,
    /// No pane has this name.
    NotFound,
    /// Names must be non-empty and must not contain `:`.
    InvalidName,
    /// The pane exists but its pixels could not be dumped.
    Dump(String),
}

impl fmt::Display for PaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate pane"),
            Self::OutOfMemory => write!(f, "oom"),
            Self::NotFound => write!(f, "targeted pane doesn't exist"),
            Self::InvalidName => write!(f, "invalid pane name"),
            Self::Dump(msg) => write!(f, "dump failed: {msg}"),
        }
    }
}

impl std::error::Error for PaneError {}

impl From<CanvasError> for PaneError {
    fn from(err: CanvasError) -> Self {
        match err {
            CanvasError::OutOfMemory { .. } => Self::OutOfMemory,
            other => Self::Dump(other.to_string()),
        }
    }
}

impl From<DumpError> for PaneError {
    fn from(err: DumpError) -> Self {
        Self::Dump(err.to_string())
    }
}

// ── Rotation lifecycle ───────────────────────────────────────────────────

/// Fatal failure of the rotation thread or of startup and shutdown.
#[derive(Debug)]
pub enum RotationError<E> {
    /// The rotation thread could not be spawned.
    Spawn(io::Error),
    /// The root pane could not be created.
    RootPane(PaneError),
    /// The backend failed to present a pane.
    Present(E),
    /// The backend failed to release its resources.
    Shutdown(E),
    /// The rotation thread panicked; the backend was lost with it.
    Panicked,
}

impl<E: fmt::Display> fmt::Display for RotationError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to spawn rotation thread: {e}"),
            Self::RootPane(e) => write!(f, "failed to create root pane: {e}"),
            Self::Present(e) => write!(f, "present failed: {e}"),
            Self::Shutdown(e) => write!(f, "backend shutdown failed: {e}"),
            Self::Panicked => write!(f, "rotation thread panicked"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RotationError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::RootPane(e) => Some(e),
            _ => None,
        }
    }
}
