//! Mirrors of the kernel DRM mode-setting UAPI and the ioctls that use them.
//!
//! Layouts follow `drm.h` / `drm_mode.h` exactly; the ioctl numbers encode
//! `size_of` of each struct, so a layout drift shows up as `ENOTTY`.

#![allow(unsafe_code)]
#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_uint};

pub(crate) const DRM_IOCTL_BASE: u8 = b'd';

pub(crate) const DRM_CAP_DUMB_BUFFER: u64 = 0x1;
pub(crate) const DRM_CLIENT_CAP_UNIVERSAL_PLANES: u64 = 2;
pub(crate) const DRM_MODE_OBJECT_PLANE: u32 = 0xeeee_eeee;
pub(crate) const DRM_MODE_CONNECTED: u32 = 1;
pub(crate) const DRM_PLANE_TYPE_PRIMARY: u64 = 1;
/// `fourcc('X', 'R', '2', '4')`: 32-bit little endian BGRX.
pub(crate) const DRM_FORMAT_XRGB8888: u32 = u32::from_le_bytes(*b"XR24");
pub(crate) const DRM_DISPLAY_MODE_LEN: usize = 32;
pub(crate) const DRM_PROP_NAME_LEN: usize = 32;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_get_cap {
    pub capability: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_set_client_cap {
    pub capability: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_card_res {
    pub fb_id_ptr: u64,
    pub crtc_id_ptr: u64,
    pub connector_id_ptr: u64,
    pub encoder_id_ptr: u64,
    pub count_fbs: u32,
    pub count_crtcs: u32,
    pub count_connectors: u32,
    pub count_encoders: u32,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_modeinfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub type_: u32,
    pub name: [c_char; DRM_DISPLAY_MODE_LEN],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_crtc {
    pub set_connectors_ptr: u64,
    pub count_connectors: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    pub mode_valid: u32,
    pub mode: drm_mode_modeinfo,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_get_connector {
    pub encoders_ptr: u64,
    pub modes_ptr: u64,
    pub props_ptr: u64,
    pub prop_values_ptr: u64,
    pub count_modes: u32,
    pub count_props: u32,
    pub count_encoders: u32,
    pub encoder_id: u32,
    pub connector_id: u32,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: u32,
    pub mm_width: u32,
    pub mm_height: u32,
    pub subpixel: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_get_plane_res {
    pub plane_id_ptr: u64,
    pub count_planes: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_get_plane {
    pub plane_id: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub possible_crtcs: u32,
    pub gamma_size: u32,
    pub count_format_types: u32,
    pub format_type_ptr: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_obj_get_properties {
    pub props_ptr: u64,
    pub prop_values_ptr: u64,
    pub count_props: u32,
    pub obj_id: u32,
    pub obj_type: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_get_property {
    pub values_ptr: u64,
    pub enum_blob_ptr: u64,
    pub prop_id: u32,
    pub flags: u32,
    pub name: [c_char; DRM_PROP_NAME_LEN],
    pub count_values: u32,
    pub count_enum_blobs: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_create_dumb {
    pub height: u32,
    pub width: u32,
    pub bpp: u32,
    pub flags: u32,
    pub handle: u32,
    pub pitch: u32,
    pub size: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_map_dumb {
    pub handle: u32,
    pub pad: u32,
    pub offset: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_destroy_dumb {
    pub handle: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_fb_cmd2 {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
    pub flags: u32,
    pub handles: [u32; 4],
    pub pitches: [u32; 4],
    pub offsets: [u32; 4],
    pub modifier: [u64; 4],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct drm_mode_crtc_page_flip {
    pub crtc_id: u32,
    pub fb_id: u32,
    pub flags: u32,
    pub reserved: u32,
    pub user_data: u64,
}

nix::ioctl_readwrite!(drm_ioctl_get_cap, DRM_IOCTL_BASE, 0x0c, drm_get_cap);
nix::ioctl_write_ptr!(
    drm_ioctl_set_client_cap,
    DRM_IOCTL_BASE,
    0x0d,
    drm_set_client_cap
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_getresources,
    DRM_IOCTL_BASE,
    0xA0,
    drm_mode_card_res
);
nix::ioctl_readwrite!(drm_ioctl_mode_getcrtc, DRM_IOCTL_BASE, 0xA1, drm_mode_crtc);
nix::ioctl_readwrite!(
    drm_ioctl_mode_getconnector,
    DRM_IOCTL_BASE,
    0xA7,
    drm_mode_get_connector
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_getproperty,
    DRM_IOCTL_BASE,
    0xAA,
    drm_mode_get_property
);
nix::ioctl_readwrite!(drm_ioctl_mode_rmfb, DRM_IOCTL_BASE, 0xAF, c_uint);
nix::ioctl_readwrite!(
    drm_ioctl_mode_page_flip,
    DRM_IOCTL_BASE,
    0xB0,
    drm_mode_crtc_page_flip
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_create_dumb,
    DRM_IOCTL_BASE,
    0xB2,
    drm_mode_create_dumb
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_map_dumb,
    DRM_IOCTL_BASE,
    0xB3,
    drm_mode_map_dumb
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_destroy_dumb,
    DRM_IOCTL_BASE,
    0xB4,
    drm_mode_destroy_dumb
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_getplaneresources,
    DRM_IOCTL_BASE,
    0xB5,
    drm_mode_get_plane_res
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_getplane,
    DRM_IOCTL_BASE,
    0xB6,
    drm_mode_get_plane
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_addfb2,
    DRM_IOCTL_BASE,
    0xB8,
    drm_mode_fb_cmd2
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_obj_getproperties,
    DRM_IOCTL_BASE,
    0xB9,
    drm_mode_obj_get_properties
);

/// NUL-terminated fixed-size kernel string to an owned `String`.
pub(crate) fn c_name(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn struct_sizes_match_kernel() {
        assert_eq!(size_of::<drm_get_cap>(), 16);
        assert_eq!(size_of::<drm_mode_card_res>(), 64);
        assert_eq!(size_of::<drm_mode_modeinfo>(), 68);
        assert_eq!(size_of::<drm_mode_crtc>(), 104);
        assert_eq!(size_of::<drm_mode_get_connector>(), 80);
        assert_eq!(size_of::<drm_mode_get_plane_res>(), 16);
        assert_eq!(size_of::<drm_mode_get_plane>(), 32);
        assert_eq!(size_of::<drm_mode_obj_get_properties>(), 32);
        assert_eq!(size_of::<drm_mode_get_property>(), 64);
        assert_eq!(size_of::<drm_mode_create_dumb>(), 32);
        assert_eq!(size_of::<drm_mode_map_dumb>(), 16);
        assert_eq!(size_of::<drm_mode_destroy_dumb>(), 4);
        assert_eq!(size_of::<drm_mode_fb_cmd2>(), 104);
        assert_eq!(size_of::<drm_mode_crtc_page_flip>(), 24);
    }

    #[test]
    fn xrgb8888_fourcc() {
        assert_eq!(DRM_FORMAT_XRGB8888, 0x3432_5258);
    }

    #[test]
    fn c_name_stops_at_nul() {
        let mut raw = [0 as c_char; DRM_PROP_NAME_LEN];
        for (dst, src) in raw.iter_mut().zip(b"type") {
            *dst = *src as c_char;
        }
        assert_eq!(c_name(&raw), "type");
    }
}
