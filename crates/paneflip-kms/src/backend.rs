//! Double-buffered presentation on a KMS plane.

use std::fmt;
use std::path::PathBuf;

use nix::errno::Errno;
use paneflip_backend::{BufferPair, DisplayBackend};
use paneflip_canvas::{BGRA_STRIDE, Canvas, CanvasLayout};

use crate::card::DriCard;
use crate::device::{DumbBuffer, KmsDevice, ModeInfo, SysResult};
use crate::discovery;
use crate::error::{KmsError, Result};

const BITS_PER_PIXEL: u32 = 32;

/// Where to look for the display device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsConfig {
    pub device_dir: PathBuf,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from("/dev/dri"),
        }
    }
}

/// One scan-out buffer: a dumb buffer registered as a framebuffer and mapped
/// for CPU writes.
#[derive(Debug)]
struct Framebuffer<M> {
    fb_id: u32,
    handle: u32,
    pitch: u32,
    size: u64,
    map: M,
}

/// A display driven through DRM/KMS dumb buffers and page flips.
pub struct KmsBackend<D: KmsDevice = DriCard> {
    device: D,
    connector_id: u32,
    crtc_id: u32,
    plane_id: u32,
    mode: ModeInfo,
    layout: CanvasLayout,
    buffers: BufferPair<Framebuffer<D::Mapping>>,
    busy_retries: u64,
}

impl<D: KmsDevice> fmt::Debug for KmsBackend<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsBackend")
            .field("connector_id", &self.connector_id)
            .field("crtc_id", &self.crtc_id)
            .field("plane_id", &self.plane_id)
            .field("mode", &self.mode)
            .field("front", &self.buffers.front_index())
            .finish_non_exhaustive()
    }
}

impl KmsBackend<DriCard> {
    /// Open the first card in `config.device_dir` and bring it up.
    pub fn open(config: &KmsConfig) -> Result<Self> {
        let path = discovery::find_card(&config.device_dir)?;
        let card = DriCard::open(&path).map_err(|source| KmsError::Open {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(target: "paneflip.kms", path = %path.display(), "opened card");
        Self::with_device(card)
    }
}

impl<D: KmsDevice> KmsBackend<D> {
    /// Run discovery and buffer setup on an already open device.
    pub fn with_device(device: D) -> Result<Self> {
        discovery::require_capabilities(&device)?;
        let res = device
            .resources()
            .map_err(KmsError::request("DRM_IOCTL_MODE_GETRESOURCES"))?;
        let connector = discovery::select_connector(&device, &res)?;
        let (crtc_id, mode) = discovery::select_crtc(&device, &res)?;
        let plane_id = discovery::select_primary_plane(&device, crtc_id)?;

        if mode.hdisplay == 0 || mode.vdisplay == 0 {
            return Err(KmsError::EmptyMode {
                width: mode.hdisplay,
                height: mode.vdisplay,
            });
        }
        let layout = CanvasLayout::bgra(mode.hdisplay, mode.vdisplay);

        let first = create_framebuffer(&device, layout)?;
        let second = match create_framebuffer(&device, layout) {
            Ok(fb) => fb,
            Err(err) => {
                if let Err(cleanup) = release_framebuffer(&device, first) {
                    tracing::warn!(
                        target: "paneflip.kms",
                        error = %cleanup,
                        "releasing first buffer after failed init failed"
                    );
                }
                return Err(err);
            }
        };

        tracing::debug!(
            target: "paneflip.kms",
            connector = connector.id,
            crtc = crtc_id,
            plane = plane_id,
            mode = %mode.name,
            "display initialised"
        );

        Ok(Self {
            device,
            connector_id: connector.id,
            crtc_id,
            plane_id,
            mode,
            layout,
            buffers: BufferPair::new(first, second),
            busy_retries: 0,
        })
    }

    #[must_use]
    pub fn mode(&self) -> &ModeInfo {
        &self.mode
    }

    #[must_use]
    pub fn crtc_id(&self) -> u32 {
        self.crtc_id
    }

    #[must_use]
    pub fn plane_id(&self) -> u32 {
        self.plane_id
    }

    /// Total page flips that had to be retried because the device was busy.
    #[must_use]
    pub fn busy_retries(&self) -> u64 {
        self.busy_retries
    }
}

impl<D: KmsDevice> DisplayBackend for KmsBackend<D> {
    type Error = KmsError;

    fn name(&self) -> &'static str {
        "kms"
    }

    fn layout(&self) -> CanvasLayout {
        self.layout
    }

    fn log_state(&self) {
        tracing::info!(
            target: "paneflip.kms",
            connector = self.connector_id,
            crtc = self.crtc_id,
            plane = self.plane_id,
            front_fb = self.buffers.front().fb_id,
            back_fb = self.buffers.back().fb_id,
            mode = %format_args!(
                "{}x{} @ {}Hz",
                self.mode.hdisplay, self.mode.vdisplay, self.mode.vrefresh
            ),
            "kms display state"
        );
    }

    fn present(&mut self, canvas: &Canvas) -> Result<()> {
        if canvas.layout() != self.layout {
            return Err(KmsError::LayoutMismatch {
                expected: self.layout,
                actual: canvas.layout(),
            });
        }

        let back = self.buffers.back_mut();
        copy_rows(canvas, back.pitch as usize, back.map.as_mut());
        let fb_id = back.fb_id;

        let mut busy = 0u64;
        loop {
            match self.device.page_flip(self.crtc_id, fb_id) {
                Ok(()) => break,
                Err(Errno::EBUSY) => {
                    busy += 1;
                    std::hint::spin_loop();
                }
                Err(source) => return Err(KmsError::PageFlip { fb_id, source }),
            }
        }
        if busy > 0 {
            self.busy_retries += busy;
            tracing::trace!(target: "paneflip.kms", fb = fb_id, retries = busy, "flip was busy");
        }

        self.buffers.flip();
        Ok(())
    }

    fn front_index(&self) -> usize {
        self.buffers.front_index()
    }

    fn shutdown(self) -> Result<()> {
        let Self {
            device, buffers, ..
        } = self;
        let mut first_err = None;
        for fb in buffers.into_inner() {
            if let Err(err) = release_framebuffer(&device, fb) {
                tracing::warn!(target: "paneflip.kms", error = %err, "buffer teardown failed");
                first_err.get_or_insert(err);
            }
        }
        if let Err(source) = device.close() {
            let err = KmsError::request("close")(source);
            tracing::warn!(target: "paneflip.kms", error = %err, "device close failed");
            first_err.get_or_insert(err);
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Create, register and map one scan-out buffer.
fn create_framebuffer<D: KmsDevice>(
    device: &D,
    layout: CanvasLayout,
) -> Result<Framebuffer<D::Mapping>> {
    let width = u32::from(layout.width);
    let height = u32::from(layout.height);

    let dumb = device
        .create_dumb(width, height, BITS_PER_PIXEL)
        .map_err(KmsError::request("DRM_IOCTL_MODE_CREATE_DUMB"))?;
    if let Err(err) = check_dumb(&dumb, width, height) {
        undo("DRM_IOCTL_MODE_DESTROY_DUMB", device.destroy_dumb(dumb.handle));
        return Err(err);
    }

    let fb_id = match device.add_framebuffer(width, height, &dumb) {
        Ok(id) => id,
        Err(source) => {
            undo("DRM_IOCTL_MODE_DESTROY_DUMB", device.destroy_dumb(dumb.handle));
            return Err(KmsError::request("DRM_IOCTL_MODE_ADDFB2")(source));
        }
    };

    let map = match device.map_dumb(&dumb) {
        Ok(map) => map,
        Err(source) => {
            undo("DRM_IOCTL_MODE_RMFB", device.remove_framebuffer(fb_id));
            undo("DRM_IOCTL_MODE_DESTROY_DUMB", device.destroy_dumb(dumb.handle));
            return Err(KmsError::request("DRM_IOCTL_MODE_MAP_DUMB")(source));
        }
    };

    Ok(Framebuffer {
        fb_id,
        handle: dumb.handle,
        pitch: dumb.pitch,
        size: dumb.size,
        map,
    })
}

/// Roll back one step of a failed buffer setup. The setup error is what the
/// caller sees; a failed rollback is only logged.
fn undo(op: &'static str, result: SysResult<()>) {
    if let Err(source) = result {
        let err = KmsError::request(op)(source);
        tracing::warn!(target: "paneflip.kms", error = %err, "rollback after failed setup failed");
    }
}

/// The driver's pitch and size must fit the rows we intend to write.
fn check_dumb(dumb: &DumbBuffer, width: u32, height: u32) -> Result<()> {
    let row = width * BGRA_STRIDE;
    if dumb.pitch < row {
        return Err(KmsError::PitchTooSmall {
            pitch: dumb.pitch,
            width,
        });
    }
    let needed = u64::from(dumb.pitch) * u64::from(height);
    if dumb.size < needed {
        return Err(KmsError::BufferTooSmall {
            size: dumb.size,
            needed,
        });
    }
    Ok(())
}

/// Unmap, unregister and free one buffer, attempting every step.
fn release_framebuffer<D: KmsDevice>(device: &D, fb: Framebuffer<D::Mapping>) -> Result<()> {
    let Framebuffer {
        fb_id,
        handle,
        size,
        map,
        ..
    } = fb;
    let unmapped = device
        .unmap(map)
        .map_err(KmsError::request("munmap"));
    let removed = device
        .remove_framebuffer(fb_id)
        .map_err(KmsError::request("DRM_IOCTL_MODE_RMFB"));
    let destroyed = device
        .destroy_dumb(handle)
        .map_err(KmsError::request("DRM_IOCTL_MODE_DESTROY_DUMB"));
    tracing::trace!(target: "paneflip.kms", fb = fb_id, handle, size, "released framebuffer");
    unmapped.and(removed).and(destroyed)
}

/// Copy a tightly packed canvas into a buffer whose rows are `pitch` bytes.
fn copy_rows(canvas: &Canvas, pitch: usize, dst: &mut [u8]) {
    let src = canvas.as_bytes();
    let row = canvas.layout().row_bytes();
    if row == 0 {
        return;
    }
    if pitch == row {
        dst[..src.len()].copy_from_slice(src);
        return;
    }
    for (y, line) in src.chunks_exact(row).enumerate() {
        let at = y * pitch;
        dst[at..at + row].copy_from_slice(line);
    }
}
