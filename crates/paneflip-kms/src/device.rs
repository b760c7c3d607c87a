//! The kernel-facing surface the KMS backend needs, as a trait.
//!
//! [`DriCard`](crate::DriCard) implements it over a real `/dev/dri/card*`
//! node. Discovery and presentation are written against the trait only, so
//! they run unchanged over a scripted device in tests.

use nix::errno::Errno;

/// Result of a single device request.
pub type SysResult<T> = Result<T, Errno>;

/// Object ids from the mode resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    pub connectors: Vec<u32>,
    pub crtcs: Vec<u32>,
}

/// The subset of connector state discovery looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub id: u32,
    pub connected: bool,
    pub mode_count: u32,
}

/// Active display timing, reduced to what the backend uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeInfo {
    pub hdisplay: u16,
    pub vdisplay: u16,
    pub vrefresh: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtcInfo {
    pub id: u32,
    /// `Some` only when the controller reports a valid mode.
    pub mode: Option<ModeInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneInfo {
    pub id: u32,
    /// Controller the plane is currently bound to, `0` if none.
    pub crtc_id: u32,
}

/// A freshly created CPU-writable buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumbBuffer {
    pub handle: u32,
    /// Bytes per row as chosen by the driver.
    pub pitch: u32,
    pub size: u64,
}

/// Operations on an open DRM device.
///
/// Every method maps to one kernel request (or a short fixed sequence) and
/// reports the raw errno on failure; callers decide what is fatal.
pub trait KmsDevice: Send {
    /// Writable view of a mapped dumb buffer.
    type Mapping: AsMut<[u8]> + AsRef<[u8]> + Send;

    fn dumb_buffer_capability(&self) -> SysResult<u64>;
    fn enable_universal_planes(&self) -> SysResult<()>;
    fn resources(&self) -> SysResult<Resources>;
    fn connector(&self, id: u32) -> SysResult<ConnectorInfo>;
    fn crtc(&self, id: u32) -> SysResult<CrtcInfo>;
    fn plane_ids(&self) -> SysResult<Vec<u32>>;
    fn plane(&self, id: u32) -> SysResult<PlaneInfo>;
    /// `(property id, value)` pairs attached to a plane.
    fn plane_properties(&self, plane_id: u32) -> SysResult<Vec<(u32, u64)>>;
    fn property_name(&self, prop_id: u32) -> SysResult<String>;

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> SysResult<DumbBuffer>;
    /// Register a dumb buffer as an XRGB8888 framebuffer, returning its id.
    fn add_framebuffer(&self, width: u32, height: u32, buffer: &DumbBuffer) -> SysResult<u32>;
    fn map_dumb(&self, buffer: &DumbBuffer) -> SysResult<Self::Mapping>;
    fn unmap(&self, mapping: Self::Mapping) -> SysResult<()>;
    fn remove_framebuffer(&self, fb_id: u32) -> SysResult<()>;
    fn destroy_dumb(&self, handle: u32) -> SysResult<()>;

    /// Queue a flip of `crtc_id` to `fb_id`. `EBUSY` means the previous flip
    /// has not completed yet.
    fn page_flip(&self, crtc_id: u32, fb_id: u32) -> SysResult<()>;

    /// Close the device node.
    fn close(self) -> SysResult<()>
    where
        Self: Sized;
}
