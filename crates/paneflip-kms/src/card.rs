//! [`KmsDevice`] over a real DRM device node.

#![allow(unsafe_code)]

use std::ffi::{c_uint, c_void};
use std::fmt;
use std::mem::ManuallyDrop;
use std::num::NonZeroUsize;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use nix::errno::Errno;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap};
use rustix::fs::{Mode, OFlags};

use crate::device::{
    ConnectorInfo, CrtcInfo, DumbBuffer, KmsDevice, ModeInfo, PlaneInfo, Resources, SysResult,
};
use crate::uapi::{self, *};

/// An open `/dev/dri/card*` node.
pub struct DriCard {
    fd: OwnedFd,
    path: PathBuf,
}

impl fmt::Debug for DriCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriCard")
            .field("path", &self.path)
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}

impl DriCard {
    /// Open `path` read/write and non-blocking.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let fd = rustix::fs::open(
            path,
            OFlags::RDWR | OFlags::NONBLOCK | OFlags::CLOEXEC,
            Mode::empty(),
        )?;
        Ok(Self {
            fd,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn raw(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Repeat a request interrupted by a signal, like libdrm's `drmIoctl`.
fn restart<T>(mut request: impl FnMut() -> nix::Result<T>) -> nix::Result<T> {
    loop {
        match request() {
            Err(Errno::EINTR | Errno::EAGAIN) => continue,
            other => return other,
        }
    }
}

impl KmsDevice for DriCard {
    type Mapping = DumbMapping;

    fn dumb_buffer_capability(&self) -> SysResult<u64> {
        let fd = self.raw();
        let mut req = drm_get_cap {
            capability: DRM_CAP_DUMB_BUFFER,
            value: 0,
        };
        // SAFETY: `req` is a live, correctly sized `drm_get_cap`.
        restart(|| unsafe { drm_ioctl_get_cap(fd, &mut req) })?;
        Ok(req.value)
    }

    fn enable_universal_planes(&self) -> SysResult<()> {
        let fd = self.raw();
        let req = drm_set_client_cap {
            capability: DRM_CLIENT_CAP_UNIVERSAL_PLANES,
            value: 1,
        };
        // SAFETY: the kernel only reads `req`.
        restart(|| unsafe { drm_ioctl_set_client_cap(fd, &req) })?;
        Ok(())
    }

    fn resources(&self) -> SysResult<Resources> {
        let fd = self.raw();
        loop {
            let mut probe = drm_mode_card_res::default();
            // SAFETY: all counts are zero, so the kernel writes no arrays.
            restart(|| unsafe { drm_ioctl_mode_getresources(fd, &mut probe) })?;

            let mut connectors = vec![0u32; probe.count_connectors as usize];
            let mut crtcs = vec![0u32; probe.count_crtcs as usize];
            let mut req = drm_mode_card_res {
                connector_id_ptr: connectors.as_mut_ptr() as u64,
                crtc_id_ptr: crtcs.as_mut_ptr() as u64,
                count_connectors: probe.count_connectors,
                count_crtcs: probe.count_crtcs,
                ..drm_mode_card_res::default()
            };
            // SAFETY: each pointer addresses a vector of exactly the count
            // passed alongside it; the kernel never writes past a count.
            restart(|| unsafe { drm_ioctl_mode_getresources(fd, &mut req) })?;

            // A hotplug between the two calls grows the counts; start over.
            if req.count_connectors <= probe.count_connectors && req.count_crtcs <= probe.count_crtcs
            {
                connectors.truncate(req.count_connectors as usize);
                crtcs.truncate(req.count_crtcs as usize);
                return Ok(Resources { connectors, crtcs });
            }
        }
    }

    fn connector(&self, id: u32) -> SysResult<ConnectorInfo> {
        let fd = self.raw();
        let mut req = drm_mode_get_connector {
            connector_id: id,
            ..drm_mode_get_connector::default()
        };
        // SAFETY: zero counts; only the fixed struct is written.
        restart(|| unsafe { drm_ioctl_mode_getconnector(fd, &mut req) })?;
        Ok(ConnectorInfo {
            id,
            connected: req.connection == DRM_MODE_CONNECTED,
            mode_count: req.count_modes,
        })
    }

    fn crtc(&self, id: u32) -> SysResult<CrtcInfo> {
        let fd = self.raw();
        let mut req = drm_mode_crtc {
            crtc_id: id,
            ..drm_mode_crtc::default()
        };
        // SAFETY: `set_connectors_ptr` is null with a zero count.
        restart(|| unsafe { drm_ioctl_mode_getcrtc(fd, &mut req) })?;
        let mode = (req.mode_valid != 0).then(|| ModeInfo {
            hdisplay: req.mode.hdisplay,
            vdisplay: req.mode.vdisplay,
            vrefresh: req.mode.vrefresh,
            name: uapi::c_name(&req.mode.name),
        });
        Ok(CrtcInfo { id, mode })
    }

    fn plane_ids(&self) -> SysResult<Vec<u32>> {
        let fd = self.raw();
        loop {
            let mut probe = drm_mode_get_plane_res::default();
            // SAFETY: zero count, no array written.
            restart(|| unsafe { drm_ioctl_mode_getplaneresources(fd, &mut probe) })?;

            let mut ids = vec![0u32; probe.count_planes as usize];
            let mut req = drm_mode_get_plane_res {
                plane_id_ptr: ids.as_mut_ptr() as u64,
                count_planes: probe.count_planes,
            };
            // SAFETY: `ids` holds `count_planes` elements.
            restart(|| unsafe { drm_ioctl_mode_getplaneresources(fd, &mut req) })?;
            if req.count_planes <= probe.count_planes {
                ids.truncate(req.count_planes as usize);
                return Ok(ids);
            }
        }
    }

    fn plane(&self, id: u32) -> SysResult<PlaneInfo> {
        let fd = self.raw();
        let mut req = drm_mode_get_plane {
            plane_id: id,
            ..drm_mode_get_plane::default()
        };
        // SAFETY: zero format count, no array written.
        restart(|| unsafe { drm_ioctl_mode_getplane(fd, &mut req) })?;
        Ok(PlaneInfo {
            id,
            crtc_id: req.crtc_id,
        })
    }

    fn plane_properties(&self, plane_id: u32) -> SysResult<Vec<(u32, u64)>> {
        let fd = self.raw();
        loop {
            let mut probe = drm_mode_obj_get_properties {
                obj_id: plane_id,
                obj_type: DRM_MODE_OBJECT_PLANE,
                ..drm_mode_obj_get_properties::default()
            };
            // SAFETY: zero count, no arrays written.
            restart(|| unsafe { drm_ioctl_mode_obj_getproperties(fd, &mut probe) })?;

            let count = probe.count_props;
            let mut ids = vec![0u32; count as usize];
            let mut values = vec![0u64; count as usize];
            let mut req = drm_mode_obj_get_properties {
                props_ptr: ids.as_mut_ptr() as u64,
                prop_values_ptr: values.as_mut_ptr() as u64,
                count_props: count,
                obj_id: plane_id,
                obj_type: DRM_MODE_OBJECT_PLANE,
            };
            // SAFETY: both arrays hold `count_props` elements.
            restart(|| unsafe { drm_ioctl_mode_obj_getproperties(fd, &mut req) })?;
            if req.count_props <= count {
                let n = req.count_props as usize;
                return Ok(ids.into_iter().zip(values).take(n).collect());
            }
        }
    }

    fn property_name(&self, prop_id: u32) -> SysResult<String> {
        let fd = self.raw();
        let mut req = drm_mode_get_property {
            prop_id,
            ..drm_mode_get_property::default()
        };
        // SAFETY: zero value and blob counts.
        restart(|| unsafe { drm_ioctl_mode_getproperty(fd, &mut req) })?;
        Ok(uapi::c_name(&req.name))
    }

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> SysResult<DumbBuffer> {
        let fd = self.raw();
        let mut req = drm_mode_create_dumb {
            width,
            height,
            bpp,
            ..drm_mode_create_dumb::default()
        };
        // SAFETY: plain in/out struct.
        restart(|| unsafe { drm_ioctl_mode_create_dumb(fd, &mut req) })?;
        Ok(DumbBuffer {
            handle: req.handle,
            pitch: req.pitch,
            size: req.size,
        })
    }

    fn add_framebuffer(&self, width: u32, height: u32, buffer: &DumbBuffer) -> SysResult<u32> {
        let fd = self.raw();
        let mut req = drm_mode_fb_cmd2 {
            width,
            height,
            pixel_format: DRM_FORMAT_XRGB8888,
            handles: [buffer.handle, 0, 0, 0],
            pitches: [buffer.pitch, 0, 0, 0],
            ..drm_mode_fb_cmd2::default()
        };
        // SAFETY: plain in/out struct.
        restart(|| unsafe { drm_ioctl_mode_addfb2(fd, &mut req) })?;
        Ok(req.fb_id)
    }

    fn map_dumb(&self, buffer: &DumbBuffer) -> SysResult<DumbMapping> {
        let fd = self.raw();
        let mut req = drm_mode_map_dumb {
            handle: buffer.handle,
            ..drm_mode_map_dumb::default()
        };
        // SAFETY: plain in/out struct.
        restart(|| unsafe { drm_ioctl_mode_map_dumb(fd, &mut req) })?;

        let len = usize::try_from(buffer.size).map_err(|_| Errno::EOVERFLOW)?;
        let length = NonZeroUsize::new(len).ok_or(Errno::EINVAL)?;
        let offset = nix::libc::off_t::try_from(req.offset).map_err(|_| Errno::EOVERFLOW)?;
        // SAFETY: a fresh shared mapping at a kernel-chosen address; nothing
        // else aliases it until it is unmapped.
        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &self.fd,
                offset,
            )
        }?;
        Ok(DumbMapping { ptr, len })
    }

    fn unmap(&self, mapping: DumbMapping) -> SysResult<()> {
        mapping.unmap()
    }

    fn remove_framebuffer(&self, fb_id: u32) -> SysResult<()> {
        let fd = self.raw();
        let mut id: c_uint = fb_id;
        // SAFETY: the kernel reads one `unsigned int`.
        restart(|| unsafe { drm_ioctl_mode_rmfb(fd, &mut id) })?;
        Ok(())
    }

    fn destroy_dumb(&self, handle: u32) -> SysResult<()> {
        let fd = self.raw();
        let mut req = drm_mode_destroy_dumb { handle };
        // SAFETY: plain in/out struct.
        restart(|| unsafe { drm_ioctl_mode_destroy_dumb(fd, &mut req) })?;
        Ok(())
    }

    fn page_flip(&self, crtc_id: u32, fb_id: u32) -> SysResult<()> {
        let fd = self.raw();
        let mut req = drm_mode_crtc_page_flip {
            crtc_id,
            fb_id,
            ..drm_mode_crtc_page_flip::default()
        };
        // SAFETY: plain in/out struct; no event is requested so `user_data`
        // is never dereferenced.
        restart(|| unsafe { drm_ioctl_mode_page_flip(fd, &mut req) })?;
        Ok(())
    }

    fn close(self) -> SysResult<()> {
        let raw = self.fd.into_raw_fd();
        // SAFETY: `raw` was just released from its `OwnedFd`; closing it
        // exactly once here.
        Errno::result(unsafe { nix::libc::close(raw) }).map(drop)
    }
}

/// A dumb buffer mapped into this process.
///
/// Unmapped by [`KmsDevice::unmap`], or on drop if that never happens.
pub struct DumbMapping {
    ptr: NonNull<c_void>,
    len: usize,
}

// SAFETY: the mapping is plain shared memory owned by this value; access goes
// through `&self`/`&mut self` like a `Vec<u8>`.
unsafe impl Send for DumbMapping {}

impl DumbMapping {
    fn unmap(self) -> SysResult<()> {
        let this = ManuallyDrop::new(self);
        // SAFETY: `ptr`/`len` describe a live mapping created by `mmap`,
        // and `ManuallyDrop` keeps `Drop` from unmapping it a second time.
        unsafe { munmap(this.ptr, this.len) }
    }
}

impl fmt::Debug for DumbMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumbMapping")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

impl AsRef<[u8]> for DumbMapping {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: `len` readable bytes live at `ptr` until unmap.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<u8>(), self.len) }
    }
}

impl AsMut<[u8]> for DumbMapping {
    fn as_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().cast::<u8>(), self.len) }
    }
}

impl Drop for DumbMapping {
    fn drop(&mut self) {
        // SAFETY: still mapped; `unmap` bypasses this via `ManuallyDrop`.
        if let Err(err) = unsafe { munmap(self.ptr, self.len) } {
            tracing::warn!(target: "paneflip.kms", error = %err, "munmap on drop failed");
        }
    }
}
