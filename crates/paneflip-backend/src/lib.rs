#![forbid(unsafe_code)]
#![doc = "Display backend trait for paneflip: the boundary between the pane runtime and a physical or virtual display."]
#![doc = ""]
#![doc = "Implementations: `paneflip-kms` (DRM/KMS dumb buffers with page flips) and"]
#![doc = "[`HeadlessBackend`] (in-memory, for tests and fixture capture)."]

use core::fmt;

use paneflip_canvas::{Canvas, CanvasError, CanvasLayout};

pub mod headless;

pub use headless::{HeadlessBackend, HeadlessConfig, HeadlessError};

/// A display that can show one canvas at a time.
///
/// A backend is opened once at startup by its own constructor, lent to the
/// rotation thread for the life of the process and consumed by
/// [`shutdown`](Self::shutdown). Errors returned from [`present`](Self::present)
/// are fatal: the display is unusable and the caller should stop.
pub trait DisplayBackend: Send {
    /// Backend-specific fatal error.
    type Error: fmt::Debug + fmt::Display + Send + 'static;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Geometry every presented canvas must have.
    fn layout(&self) -> CanvasLayout;

    /// Emit one `info` event describing the active display state.
    fn log_state(&self);

    /// A zeroed canvas compatible with [`present`](Self::present).
    fn allocate_canvas(&self) -> Result<Canvas, CanvasError> {
        Canvas::try_with_layout(self.layout())
    }

    /// Copy `canvas` into the back buffer and make it the front buffer.
    ///
    /// `canvas` must have been created with this backend's layout.
    fn present(&mut self, canvas: &Canvas) -> Result<(), Self::Error>;

    /// Follow-up work for the last [`present`](Self::present) that does not
    /// need the presented canvas, such as writing the shown frame to disk.
    ///
    /// Callers that lock the canvas around `present` invoke this after
    /// unlocking it. Errors are fatal, as for `present`.
    fn after_present(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Index (0 or 1) of the buffer currently on screen.
    fn front_index(&self) -> usize;

    /// Release every resource held by the backend.
    fn shutdown(self) -> Result<(), Self::Error>
    where
        Self: Sized;
}

/// Exactly two buffers, one front and one back.
///
/// The roles are tracked by a single index toggled with XOR, so the two
/// buffers can never share a role. After `n` flips the front index equals
/// the initial one XOR `n mod 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPair<T> {
    buffers: [T; 2],
    front: usize,
}

impl<T> BufferPair<T> {
    /// Pair with buffer 0 in front.
    #[must_use]
    pub fn new(first: T, second: T) -> Self {
        Self {
            buffers: [first, second],
            front: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn front_index(&self) -> usize {
        self.front
    }

    #[inline]
    #[must_use]
    pub fn back_index(&self) -> usize {
        self.front ^ 1
    }

    #[inline]
    #[must_use]
    pub fn front(&self) -> &T {
        &self.buffers[self.front]
    }

    #[inline]
    #[must_use]
    pub fn back(&self) -> &T {
        &self.buffers[self.back_index()]
    }

    #[inline]
    pub fn back_mut(&mut self) -> &mut T {
        let back = self.back_index();
        &mut self.buffers[back]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.buffers.get(index)
    }

    /// Swap the front and back roles.
    #[inline]
    pub fn flip(&mut self) {
        self.front ^= 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffers.iter()
    }

    /// Take both buffers out, in index order.
    #[must_use]
    pub fn into_inner(self) -> [T; 2] {
        self.buffers
    }
}
