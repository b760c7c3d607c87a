#![deny(unsafe_code)]
#![doc = "DRM/KMS display backend for paneflip."]
#![doc = ""]
#![doc = "Implements [`paneflip_backend::DisplayBackend`] on the first `card*` node"]
#![doc = "of a DRM device directory: one connected output, its active CRTC mode,"]
#![doc = "the primary plane, and two mapped dumb buffers flipped in turn."]
#![doc = ""]
#![doc = "`unsafe` is confined to the ioctl and mmap boundary (`uapi` and `card`)."]

#[cfg(not(target_os = "linux"))]
compile_error!("paneflip-kms drives the Linux DRM subsystem and only builds on Linux");

mod backend;
mod card;
mod device;
pub mod discovery;
mod error;
mod uapi;

#[cfg(test)]
mod fake;

pub use backend::{KmsBackend, KmsConfig};
pub use card::{DriCard, DumbMapping};
pub use device::{
    ConnectorInfo, CrtcInfo, DumbBuffer, KmsDevice, ModeInfo, PlaneInfo, Resources, SysResult,
};
pub use error::{KmsError, Result};
