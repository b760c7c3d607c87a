use std::path::PathBuf;

use nix::errno::Errno;
use paneflip_canvas::CanvasLayout;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KmsError>;

/// Everything that can go wrong bringing up or driving a KMS display.
///
/// None of these are recoverable: a display server without its display has
/// nothing left to do.
#[derive(Debug, Error)]
pub enum KmsError {
    #[error("cannot read device directory {path}: {source}")]
    DeviceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no card* device node in {path}")]
    NoCard { path: PathBuf },

    #[error("failed to open device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} failed: {source}")]
    Request {
        op: &'static str,
        #[source]
        source: Errno,
    },

    #[error("device doesn't support dumb buffers")]
    NoDumbBuffers,

    #[error("could not enable universal planes: {0}")]
    UniversalPlanes(#[source] Errno),

    #[error("no connected connector with a display mode")]
    NoConnector,

    #[error("no CRTC with a valid mode")]
    NoCrtc,

    #[error("no primary plane bound to CRTC {crtc_id}")]
    NoPlane { crtc_id: u32 },

    #[error("plane {plane_id} has no type property")]
    NoPlaneType { plane_id: u32 },

    #[error("mode {width}x{height} has no pixels")]
    EmptyMode { width: u16, height: u16 },

    #[error("driver pitch {pitch} cannot hold a {width}-pixel row")]
    PitchTooSmall { pitch: u32, width: u32 },

    #[error("dumb buffer of {size} bytes cannot hold {needed} bytes")]
    BufferTooSmall { size: u64, needed: u64 },

    #[error("presented canvas is {actual:?}, display is {expected:?}")]
    LayoutMismatch {
        expected: CanvasLayout,
        actual: CanvasLayout,
    },

    #[error("page flip to framebuffer {fb_id} failed: {source}")]
    PageFlip {
        fb_id: u32,
        #[source]
        source: Errno,
    },
}

impl KmsError {
    /// Wrap the errno of a failed device request.
    pub(crate) fn request(op: &'static str) -> impl FnOnce(Errno) -> Self {
        move |source| Self::Request { op, source }
    }
}
