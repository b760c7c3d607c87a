#![forbid(unsafe_code)]

//! Pane runtime for paneflip.
//!
//! # Role in paneflip
//! `paneflip-runtime` sits between the command front end and a
//! [`DisplayBackend`](paneflip_backend::DisplayBackend). It owns the named
//! panes, the thread that rotates them onto the display, and the
//! cancellation signal that stops every long-running loop in the process.
//!
//! # How it fits in the system
//! The binary opens a backend, hands it to [`PaneManager::start`], and then
//! forwards parsed commands to the manager's create, remove and draw calls.
//! A signal, end of input or a fatal present error cancels the shared
//! [`CancellationSource`]; [`PaneManager::shutdown`] then joins the rotation
//! thread and releases the backend.

pub mod cancellation;
pub mod error;
pub mod manager;
pub mod pane;

pub use cancellation::{CancellationSource, CancellationToken};
pub use error::{PaneError, RotationError};
pub use manager::{DEFAULT_TICK, PaneManager, ROOT_PANE, ROTATION_THREAD, RotationStats};
pub use pane::{Pane, PaneSet, is_valid_name};
