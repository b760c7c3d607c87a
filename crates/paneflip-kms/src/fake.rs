//! Scripted [`KmsDevice`] for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use nix::errno::Errno;

use crate::device::{
    ConnectorInfo, CrtcInfo, DumbBuffer, KmsDevice, ModeInfo, PlaneInfo, Resources, SysResult,
};

#[derive(Debug, Clone)]
pub(crate) struct FakeCrtc {
    pub id: u32,
    pub mode: Option<ModeInfo>,
}

impl FakeCrtc {
    pub fn idle(id: u32) -> Self {
        Self { id, mode: None }
    }

    pub fn active(id: u32, w: u16, h: u16) -> Self {
        Self {
            id,
            mode: Some(ModeInfo {
                hdisplay: w,
                vdisplay: h,
                vrefresh: 60,
                name: format!("{w}x{h}"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakePlane {
    pub id: u32,
    pub crtc_id: u32,
    pub props: Vec<(u32, u64)>,
}

impl FakePlane {
    pub fn primary(id: u32, crtc_id: u32) -> Self {
        Self {
            id,
            crtc_id,
            props: vec![(FakeDevice::ZPOS_PROP, 0), (FakeDevice::TYPE_PROP, 1)],
        }
    }

    pub fn overlay(id: u32, crtc_id: u32) -> Self {
        Self {
            id,
            crtc_id,
            props: vec![(FakeDevice::TYPE_PROP, 0)],
        }
    }
}

/// Mutable device-side state, shared so tests can inspect it after the
/// backend has consumed the device.
#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub events: Vec<String>,
    pub next_handle: u32,
    pub next_fb: u32,
    /// Flips still to be rejected with `EBUSY`.
    pub busy_flips: u32,
    pub busy_seen: u32,
    pub flip_error: Option<Errno>,
    pub unmap_error: Option<Errno>,
    pub destroy_error: Option<Errno>,
    pub flipped_to: Vec<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeDevice {
    pub dumb_cap: u64,
    pub universal_planes: bool,
    pub connectors: Vec<ConnectorInfo>,
    pub crtcs: Vec<FakeCrtc>,
    pub planes: Vec<FakePlane>,
    pub prop_names: HashMap<u32, String>,
    /// Extra bytes the driver adds to every row.
    pub row_padding: u32,
    pub pitch_override: Option<u32>,
    pub fail_add_fb: bool,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeDevice {
    pub const CONNECTOR: u32 = 20;
    pub const CRTC: u32 = 41;
    pub const PLANE: u32 = 55;
    pub const TYPE_PROP: u32 = 5;
    pub const ZPOS_PROP: u32 = 7;

    /// One connected output driven by [`Self::CRTC`] at `w`x`h`.
    pub fn single_display(w: u16, h: u16) -> Self {
        let mut prop_names = HashMap::new();
        prop_names.insert(Self::TYPE_PROP, "type".to_owned());
        prop_names.insert(Self::ZPOS_PROP, "zpos".to_owned());
        Self {
            dumb_cap: 1,
            universal_planes: true,
            connectors: vec![ConnectorInfo {
                id: Self::CONNECTOR,
                connected: true,
                mode_count: 1,
            }],
            crtcs: vec![FakeCrtc::active(Self::CRTC, w, h)],
            planes: vec![FakePlane::primary(Self::PLANE, Self::CRTC)],
            prop_names,
            row_padding: 0,
            pitch_override: None,
            fail_add_fb: false,
            state: Arc::new(Mutex::new(FakeState {
                next_handle: 1,
                next_fb: 100,
                ..FakeState::default()
            })),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self, event: String) {
        self.state().events.push(event);
    }
}

impl KmsDevice for FakeDevice {
    type Mapping = Vec<u8>;

    fn dumb_buffer_capability(&self) -> SysResult<u64> {
        Ok(self.dumb_cap)
    }

    fn enable_universal_planes(&self) -> SysResult<()> {
        if self.universal_planes {
            Ok(())
        } else {
            Err(Errno::EINVAL)
        }
    }

    fn resources(&self) -> SysResult<Resources> {
        Ok(Resources {
            connectors: self.connectors.iter().map(|c| c.id).collect(),
            crtcs: self.crtcs.iter().map(|c| c.id).collect(),
        })
    }

    fn connector(&self, id: u32) -> SysResult<ConnectorInfo> {
        self.connectors
            .iter()
            .find(|c| c.id == id)
            .copied()
            .ok_or(Errno::ENOENT)
    }

    fn crtc(&self, id: u32) -> SysResult<CrtcInfo> {
        self.crtcs
            .iter()
            .find(|c| c.id == id)
            .map(|c| CrtcInfo {
                id: c.id,
                mode: c.mode.clone(),
            })
            .ok_or(Errno::ENOENT)
    }

    fn plane_ids(&self) -> SysResult<Vec<u32>> {
        Ok(self.planes.iter().map(|p| p.id).collect())
    }

    fn plane(&self, id: u32) -> SysResult<PlaneInfo> {
        self.planes
            .iter()
            .find(|p| p.id == id)
            .map(|p| PlaneInfo {
                id: p.id,
                crtc_id: p.crtc_id,
            })
            .ok_or(Errno::ENOENT)
    }

    fn plane_properties(&self, plane_id: u32) -> SysResult<Vec<(u32, u64)>> {
        self.planes
            .iter()
            .find(|p| p.id == plane_id)
            .map(|p| p.props.clone())
            .ok_or(Errno::ENOENT)
    }

    fn property_name(&self, prop_id: u32) -> SysResult<String> {
        self.prop_names.get(&prop_id).cloned().ok_or(Errno::ENOENT)
    }

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> SysResult<DumbBuffer> {
        let pitch = self
            .pitch_override
            .unwrap_or(width * bpp / 8 + self.row_padding);
        let mut state = self.state();
        let handle = state.next_handle;
        state.next_handle += 1;
        state.events.push(format!("create {handle}"));
        Ok(DumbBuffer {
            handle,
            pitch,
            size: u64::from(pitch) * u64::from(height),
        })
    }

    fn add_framebuffer(&self, _width: u32, _height: u32, buffer: &DumbBuffer) -> SysResult<u32> {
        if self.fail_add_fb {
            return Err(Errno::EINVAL);
        }
        let mut state = self.state();
        let fb = state.next_fb;
        state.next_fb += 1;
        state.events.push(format!("addfb {fb} handle {}", buffer.handle));
        Ok(fb)
    }

    fn map_dumb(&self, buffer: &DumbBuffer) -> SysResult<Vec<u8>> {
        self.log(format!("map {}", buffer.handle));
        Ok(vec![0; buffer.size as usize])
    }

    fn unmap(&self, mapping: Vec<u8>) -> SysResult<()> {
        let mut state = self.state();
        state.events.push(format!("unmap {}", mapping.len()));
        match state.unmap_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn remove_framebuffer(&self, fb_id: u32) -> SysResult<()> {
        self.log(format!("rmfb {fb_id}"));
        Ok(())
    }

    fn destroy_dumb(&self, handle: u32) -> SysResult<()> {
        let mut state = self.state();
        state.events.push(format!("destroy {handle}"));
        match state.destroy_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn page_flip(&self, crtc_id: u32, fb_id: u32) -> SysResult<()> {
        let mut state = self.state();
        if crtc_id != Self::CRTC {
            return Err(Errno::ENOENT);
        }
        if state.busy_flips > 0 {
            state.busy_flips -= 1;
            state.busy_seen += 1;
            return Err(Errno::EBUSY);
        }
        if let Some(err) = state.flip_error {
            return Err(err);
        }
        state.flipped_to.push(fb_id);
        Ok(())
    }

    fn close(self) -> SysResult<()> {
        self.log("close".to_owned());
        Ok(())
    }
}
