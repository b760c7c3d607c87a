//! Device, connector, controller and plane selection.
//!
//! Each step takes the first qualifying object in kernel enumeration order.
//! Failing to find one is fatal; there is no fallback display.

use std::path::{Path, PathBuf};

use crate::device::{ConnectorInfo, KmsDevice, ModeInfo, Resources};
use crate::error::{KmsError, Result};
use crate::uapi::DRM_PLANE_TYPE_PRIMARY;

/// First `card*` node in `dir`, by name.
pub fn find_card(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|source| KmsError::DeviceDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut cards = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| KmsError::DeviceDir {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_name().to_string_lossy().starts_with("card") {
            cards.push(entry.path());
        }
    }
    cards.sort();
    cards.into_iter().next().ok_or_else(|| KmsError::NoCard {
        path: dir.to_path_buf(),
    })
}

/// Dumb buffers must be supported and universal planes enabled.
pub fn require_capabilities<D: KmsDevice>(device: &D) -> Result<()> {
    let cap = device
        .dumb_buffer_capability()
        .map_err(KmsError::request("DRM_IOCTL_GET_CAP"))?;
    if cap == 0 {
        return Err(KmsError::NoDumbBuffers);
    }
    device
        .enable_universal_planes()
        .map_err(KmsError::UniversalPlanes)
}

/// First connector that is connected and advertises at least one mode.
pub fn select_connector<D: KmsDevice>(device: &D, res: &Resources) -> Result<ConnectorInfo> {
    for &id in &res.connectors {
        let conn = device
            .connector(id)
            .map_err(KmsError::request("DRM_IOCTL_MODE_GETCONNECTOR"))?;
        if conn.connected && conn.mode_count > 0 {
            return Ok(conn);
        }
        tracing::debug!(
            target: "paneflip.kms",
            connector = id,
            connected = conn.connected,
            modes = conn.mode_count,
            "skipping connector"
        );
    }
    Err(KmsError::NoConnector)
}

/// First controller currently driving a valid mode, with that mode.
pub fn select_crtc<D: KmsDevice>(device: &D, res: &Resources) -> Result<(u32, ModeInfo)> {
    for &id in &res.crtcs {
        let crtc = device
            .crtc(id)
            .map_err(KmsError::request("DRM_IOCTL_MODE_GETCRTC"))?;
        if let Some(mode) = crtc.mode {
            return Ok((crtc.id, mode));
        }
    }
    Err(KmsError::NoCrtc)
}

/// The primary plane bound to `crtc_id`.
pub fn select_primary_plane<D: KmsDevice>(device: &D, crtc_id: u32) -> Result<u32> {
    let ids = device
        .plane_ids()
        .map_err(KmsError::request("DRM_IOCTL_MODE_GETPLANERESOURCES"))?;
    for id in ids {
        let plane = device
            .plane(id)
            .map_err(KmsError::request("DRM_IOCTL_MODE_GETPLANE"))?;
        if plane.crtc_id == crtc_id && is_primary_plane(device, id)? {
            return Ok(id);
        }
    }
    Err(KmsError::NoPlane { crtc_id })
}

/// Whether the plane's `type` property says primary. A plane without a
/// `type` property means universal planes are not really in effect.
fn is_primary_plane<D: KmsDevice>(device: &D, plane_id: u32) -> Result<bool> {
    let props = device
        .plane_properties(plane_id)
        .map_err(KmsError::request("DRM_IOCTL_MODE_OBJ_GETPROPERTIES"))?;
    for (prop_id, value) in props {
        let name = device
            .property_name(prop_id)
            .map_err(KmsError::request("DRM_IOCTL_MODE_GETPROPERTY"))?;
        if name == "type" {
            return Ok(value == DRM_PLANE_TYPE_PRIMARY);
        }
    }
    Err(KmsError::NoPlaneType { plane_id })
}
