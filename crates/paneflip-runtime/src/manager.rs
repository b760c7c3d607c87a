#![forbid(unsafe_code)]

//! Pane manager and rotation thread.
//!
//! [`PaneManager`] owns the pane set behind one mutex and a background
//! thread that presents one pane per tick. Tick `i` shows pane `i mod n`,
//! where `n` is the number of panes at that tick. The controller side
//! (create, remove and draw calls) and the rotation side take the same lock;
//! the controller never holds it across a present.
//!
//! # Lifecycle
//!
//! ```text
//! start ──► Running ──(tick: lock, present, unlock, wait)──► Running
//!              │
//!              ├── cancel observed ──────────────► Cancelled
//!              └── present error ── cancel ──────► Failed
//! ```
//!
//! The backend moves into the rotation thread at [`PaneManager::start`] and
//! comes back when the thread is joined by [`PaneManager::shutdown`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use paneflip_backend::DisplayBackend;
use paneflip_canvas::{
    Bezier2, Canvas, CanvasLayout, Circle, Color, Line, Rect, RectCopy, Triangle, dump_rgba,
};
use web_time::Duration;

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::error::{PaneError, RotationError};
use crate::pane::{Pane, PaneSet, is_valid_name};

/// Name of the pane created at startup.
pub const ROOT_PANE: &str = "root";

/// Name given to the rotation thread.
pub const ROTATION_THREAD: &str = "paneflip-rotation";

/// Default time between two presents.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

// ─────────────────────────────────────────────────────────────────────────
// Statistics
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StatsInner {
    presents: AtomicU64,
    skipped: AtomicU64,
}

/// Counters updated by the rotation thread.
#[derive(Debug, Clone, Default)]
pub struct RotationStats {
    inner: Arc<StatsInner>,
}

impl RotationStats {
    /// Successful presents so far.
    #[must_use]
    pub fn presents(&self) -> u64 {
        self.inner.presents.load(Ordering::Relaxed)
    }

    /// Ticks that found no pane to show.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.inner.skipped.load(Ordering::Relaxed)
    }

    fn record_present(&self) {
        self.inner.presents.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.inner.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────────────────────────────────

/// What the rotation thread hands back when it stops.
struct RotationExit<B: DisplayBackend> {
    backend: B,
    error: Option<B::Error>,
}

/// Named canvases cycled onto a display.
pub struct PaneManager<B: DisplayBackend + 'static> {
    panes: Arc<Mutex<PaneSet>>,
    layout: CanvasLayout,
    cancel: CancellationSource,
    stats: RotationStats,
    rotation: Option<JoinHandle<RotationExit<B>>>,
}

impl<B: DisplayBackend + 'static> PaneManager<B> {
    /// Create the root pane filled with `root_color` and start rotating.
    pub fn start(
        backend: B,
        root_color: Color,
        interval: Duration,
    ) -> Result<Self, RotationError<B::Error>> {
        Self::start_with_cancel(backend, root_color, interval, CancellationSource::new())
    }

    /// Like [`start`](Self::start), observing an existing cancellation source.
    ///
    /// The rotation thread also cancels `cancel` when a present fails, so
    /// every other holder of the source learns that the display is gone.
    pub fn start_with_cancel(
        backend: B,
        root_color: Color,
        interval: Duration,
        cancel: CancellationSource,
    ) -> Result<Self, RotationError<B::Error>> {
        let layout = backend.layout();
        let mut set = PaneSet::new();
        let root = backend
            .allocate_canvas()
            .map_err(PaneError::from)
            .and_then(|mut canvas| {
                canvas.fill(root_color);
                set.insert(Pane::new(ROOT_PANE, canvas))
            });
        if let Err(err) = root {
            release(backend);
            return Err(RotationError::RootPane(err));
        }

        let panes = Arc::new(Mutex::new(set));
        let stats = RotationStats::default();
        let worker = Rotation {
            panes: Arc::clone(&panes),
            token: cancel.token(),
            cancel: cancel.clone(),
            stats: stats.clone(),
            interval,
        };

        // On spawn failure the backend is dropped with the closure.
        let rotation = thread::Builder::new()
            .name(ROTATION_THREAD.into())
            .spawn(move || worker.run(backend))
            .map_err(RotationError::Spawn)?;

        tracing::info!(
            target: "paneflip.rotation",
            width = layout.width,
            height = layout.height,
            interval_ms = interval.as_millis() as u64,
            "rotation started"
        );

        Ok(Self {
            panes,
            layout,
            cancel,
            stats,
            rotation: Some(rotation),
        })
    }

    /// Geometry of every pane.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> CanvasLayout {
        self.layout
    }

    #[must_use]
    pub fn stats(&self) -> &RotationStats {
        &self.stats
    }

    /// The source this manager cancels on shutdown.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationSource {
        &self.cancel
    }

    /// `true` while the rotation thread has not exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.rotation.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, PaneSet> {
        self.panes.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Pane lifecycle ───────────────────────────────────────────────

    /// Add a pane filled with `color`. It joins the rotation at the end.
    pub fn create(&self, name: &str, color: Color) -> Result<(), PaneError> {
        if !is_valid_name(name) {
            return Err(PaneError::InvalidName);
        }
        if self.lock().contains(name) {
            return Err(PaneError::Duplicate);
        }
        // Allocate outside the lock; `insert` re-checks the name.
        let mut canvas = Canvas::try_with_layout(self.layout)?;
        canvas.fill(color);
        self.lock().insert(Pane::new(name, canvas))
    }

    /// Destroy a pane. Later panes move up one slot.
    pub fn remove(&self, name: &str) -> Result<(), PaneError> {
        self.lock().remove(name).map(drop)
    }

    /// Pane names in rotation order.
    #[must_use]
    pub fn pane_names(&self) -> Vec<String> {
        self.lock().names().map(str::to_owned).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run `f` on a pane's canvas while holding the lock.
    pub fn with_pane<R>(&self, name: &str, f: impl FnOnce(&Canvas) -> R) -> Result<R, PaneError> {
        let set = self.lock();
        let pane = set.get(name).ok_or(PaneError::NotFound)?;
        Ok(f(pane.canvas()))
    }

    fn with_pane_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Canvas) -> R,
    ) -> Result<R, PaneError> {
        let mut set = self.lock();
        let pane = set.get_mut(name).ok_or(PaneError::NotFound)?;
        Ok(f(pane.canvas_mut()))
    }

    /// Raw RGBA dump of a pane.
    pub fn dump_pane(&self, name: &str) -> Result<Vec<u8>, PaneError> {
        Ok(self.with_pane(name, dump_rgba)??)
    }

    // ── Drawing ──────────────────────────────────────────────────────

    pub fn fill(&self, name: &str, color: Color) -> Result<(), PaneError> {
        self.with_pane_mut(name, |c| c.fill(color))
    }

    pub fn draw_rect(&self, name: &str, rect: &Rect, color: Color) -> Result<(), PaneError> {
        self.with_pane_mut(name, |c| c.draw_rect(rect, color))
    }

    pub fn draw_circle(&self, name: &str, circle: &Circle, color: Color) -> Result<(), PaneError> {
        self.with_pane_mut(name, |c| c.draw_circle(circle, color))
    }

    pub fn draw_line(&self, name: &str, line: &Line, color: Color) -> Result<(), PaneError> {
        self.with_pane_mut(name, |c| c.draw_line(line, color))
    }

    pub fn draw_triangle(&self, name: &str, tri: &Triangle, color: Color) -> Result<(), PaneError> {
        self.with_pane_mut(name, |c| c.draw_triangle(tri, color))
    }

    pub fn draw_bezier2(&self, name: &str, curve: &Bezier2, color: Color) -> Result<(), PaneError> {
        self.with_pane_mut(name, |c| c.draw_bezier2(curve, color))
    }

    pub fn copy_rect(&self, name: &str, copy: &RectCopy) -> Result<(), PaneError> {
        self.with_pane_mut(name, |c| c.copy_rect(copy))
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Cancel and join the rotation thread, destroy every pane and shut the
    /// backend down.
    ///
    /// A present failure that stopped the rotation takes precedence over a
    /// failure to release the backend.
    pub fn shutdown(mut self) -> Result<(), RotationError<B::Error>> {
        self.cancel.cancel();
        let Some(handle) = self.rotation.take() else {
            return Ok(());
        };
        let joined = handle.join();
        self.lock().clear();
        let exit = joined.map_err(|_| RotationError::Panicked)?;

        let released = exit.backend.shutdown();
        tracing::info!(
            target: "paneflip.rotation",
            presents = self.stats.presents(),
            skipped = self.stats.skipped(),
            "rotation stopped"
        );
        match (exit.error, released) {
            (Some(err), released) => {
                if let Err(e) = released {
                    tracing::warn!(target: "paneflip.rotation", error = %e, "backend shutdown failed");
                }
                Err(RotationError::Present(err))
            }
            (None, Err(err)) => Err(RotationError::Shutdown(err)),
            (None, Ok(())) => Ok(()),
        }
    }
}

impl<B: DisplayBackend + 'static> Drop for PaneManager<B> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.rotation.take()
            && let Ok(exit) = handle.join()
        {
            release(exit.backend);
        }
    }
}

/// Shut `backend` down, logging a failure.
fn release<B: DisplayBackend>(backend: B) {
    if let Err(err) = backend.shutdown() {
        tracing::warn!(target: "paneflip.rotation", error = %err, "backend shutdown failed");
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Rotation thread
// ─────────────────────────────────────────────────────────────────────────

struct Rotation {
    panes: Arc<Mutex<PaneSet>>,
    token: CancellationToken,
    cancel: CancellationSource,
    stats: RotationStats,
    interval: Duration,
}

impl Rotation {
    fn run<B: DisplayBackend>(self, mut backend: B) -> RotationExit<B> {
        let mut tick: u64 = 0;
        while !self.token.is_cancelled() {
            if let Err(err) = self.present_tick(&mut backend, tick) {
                tracing::error!(target: "paneflip.rotation", tick, error = %err, "present failed");
                self.cancel.cancel();
                return RotationExit {
                    backend,
                    error: Some(err),
                };
            }
            tick = tick.wrapping_add(1);
            if self.token.wait_timeout(self.interval) {
                break;
            }
        }
        tracing::debug!(target: "paneflip.rotation", tick, "rotation cancelled");
        RotationExit {
            backend,
            error: None,
        }
    }

    fn present_tick<B: DisplayBackend>(&self, backend: &mut B, tick: u64) -> Result<(), B::Error> {
        {
            let set = self.panes.lock().unwrap_or_else(|e| e.into_inner());
            if set.is_empty() {
                self.stats.record_skip();
                return Ok(());
            }
            let slot = (tick % set.len() as u64) as usize;
            let Some(pane) = set.nth(slot) else {
                return Ok(());
            };
            tracing::debug!(target: "paneflip.rotation", pane = pane.name(), tick, "flipping pane");
            backend.present(pane.canvas())?;
        }
        // Outside the pane lock.
        backend.after_present()?;
        self.stats.record_present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paneflip_backend::{HeadlessBackend, HeadlessConfig};
    use paneflip_canvas::load_rgba;
    use std::fmt;

    const ROOT: Color = Color::rgb(0x22, 0x22, 0x88);
    const FAST: Duration = Duration::from_millis(2);

    fn headless(w: u16, h: u16) -> HeadlessBackend {
        HeadlessBackend::open(HeadlessConfig {
            width: w,
            height: h,
            dump_dir: None,
        })
        .unwrap()
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = web_time::Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(web_time::Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(1));
        }
    }

    // ── Mock backend ─────────────────────────────────────────────────

    #[derive(Debug)]
    struct MockError(&'static str);

    impl fmt::Display for MockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    /// Fails the present after `ok_presents` successes.
    struct FlakyBackend {
        ok_presents: u32,
        front: usize,
        shut_down: Arc<AtomicU64>,
    }

    impl DisplayBackend for FlakyBackend {
        type Error = MockError;

        fn name(&self) -> &'static str {
            "flaky"
        }

        fn layout(&self) -> CanvasLayout {
            CanvasLayout::bgra(4, 4)
        }

        fn log_state(&self) {}

        fn present(&mut self, _canvas: &Canvas) -> Result<(), MockError> {
            if self.ok_presents == 0 {
                return Err(MockError("flip rejected"));
            }
            self.ok_presents -= 1;
            self.front ^= 1;
            Ok(())
        }

        fn front_index(&self) -> usize {
            self.front
        }

        fn shutdown(self) -> Result<(), MockError> {
            self.shut_down.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn flaky(ok_presents: u32) -> (FlakyBackend, Arc<AtomicU64>) {
        let shut_down = Arc::new(AtomicU64::new(0));
        (
            FlakyBackend {
                ok_presents,
                front: 0,
                shut_down: Arc::clone(&shut_down),
            },
            shut_down,
        )
    }

    // ── Panes ────────────────────────────────────────────────────────

    #[test]
    fn start_creates_filled_root_pane() {
        let mgr = PaneManager::start(headless(8, 6), ROOT, FAST).unwrap();
        assert_eq!(mgr.pane_names(), [ROOT_PANE]);
        let px = mgr.with_pane(ROOT_PANE, |c| c.pixel(7, 5)).unwrap();
        assert_eq!(px, Some(ROOT));
        assert_eq!(mgr.layout(), CanvasLayout::bgra(8, 6));
        mgr.shutdown().unwrap();
    }

    #[test]
    fn create_and_remove_follow_rotation_order() {
        let mgr = PaneManager::start(headless(4, 4), ROOT, DEFAULT_TICK).unwrap();
        mgr.create("a", Color::WHITE).unwrap();
        mgr.create("b", Color::BLACK).unwrap();
        assert_eq!(mgr.pane_names(), ["root", "a", "b"]);

        assert_eq!(mgr.create("a", ROOT), Err(PaneError::Duplicate));
        assert_eq!(mgr.len(), 3);

        mgr.remove("a").unwrap();
        assert_eq!(mgr.pane_names(), ["root", "b"]);
        assert_eq!(mgr.remove("a"), Err(PaneError::NotFound));
        mgr.shutdown().unwrap();
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mgr = PaneManager::start(headless(4, 4), ROOT, DEFAULT_TICK).unwrap();
        assert_eq!(mgr.create("", ROOT), Err(PaneError::InvalidName));
        assert_eq!(mgr.create("a:b", ROOT), Err(PaneError::InvalidName));
        assert_eq!(mgr.len(), 1);
        mgr.shutdown().unwrap();
    }

    #[test]
    fn drawing_on_missing_pane_is_not_found() {
        let mgr = PaneManager::start(headless(4, 4), ROOT, DEFAULT_TICK).unwrap();
        let red = Color::rgb(0xFF, 0, 0);
        assert_eq!(
            mgr.draw_rect("nope", &Rect::new(0, 0, 1, 1), red),
            Err(PaneError::NotFound)
        );
        assert_eq!(
            mgr.draw_circle("nope", &Circle::new(1, 1, 1), red),
            Err(PaneError::NotFound)
        );
        assert_eq!(mgr.fill("nope", red), Err(PaneError::NotFound));
        assert_eq!(mgr.dump_pane("nope"), Err(PaneError::NotFound));
        mgr.shutdown().unwrap();
    }

    #[test]
    fn draw_calls_reach_the_named_pane_only() {
        let mgr = PaneManager::start(headless(20, 20), ROOT, DEFAULT_TICK).unwrap();
        let c = Color::rgb(0x11, 0x22, 0x33);
        mgr.create("main", Color::BLACK).unwrap();
        mgr.draw_rect("main", &Rect::new(10, 10, 5, 5), c).unwrap();

        assert_eq!(mgr.with_pane("main", |p| p.pixel(12, 12)).unwrap(), Some(c));
        assert_eq!(
            mgr.with_pane("main", |p| p.pixel(9, 9)).unwrap(),
            Some(Color::BLACK)
        );
        assert_eq!(mgr.with_pane("root", |p| p.pixel(12, 12)).unwrap(), Some(ROOT));

        mgr.draw_line("main", &Line::new(0, 0, 19, 0), c).unwrap();
        assert_eq!(mgr.with_pane("main", |p| p.pixel(19, 0)).unwrap(), Some(c));

        mgr.copy_rect(
            "main",
            &RectCopy {
                dst_x: 0,
                dst_y: 10,
                src_x: 10,
                src_y: 10,
                w: 5,
                h: 5,
            },
        )
        .unwrap();
        assert_eq!(mgr.with_pane("main", |p| p.pixel(2, 12)).unwrap(), Some(c));
        mgr.shutdown().unwrap();
    }

    #[test]
    fn dump_pane_is_rgba() {
        let mgr = PaneManager::start(headless(3, 2), ROOT, DEFAULT_TICK).unwrap();
        let dump = mgr.dump_pane(ROOT_PANE).unwrap();
        assert_eq!(dump.len(), 3 * 2 * 4);
        for px in dump.chunks_exact(4) {
            assert_eq!(px, [0x22, 0x22, 0x88, 0xFF]);
        }
        mgr.shutdown().unwrap();
    }

    // ── Rotation ─────────────────────────────────────────────────────

    #[test]
    fn rotation_presents_panes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let backend = HeadlessBackend::open(HeadlessConfig {
            width: 2,
            height: 2,
            dump_dir: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        // Long tick so the second pane exists before the second present.
        let mgr = PaneManager::start(backend, ROOT, Duration::from_millis(50)).unwrap();
        mgr.create("white", Color::WHITE).unwrap();
        wait_for(|| mgr.stats().presents() >= 3);
        mgr.shutdown().unwrap();

        let frame = |n: u32| {
            let bytes = std::fs::read(dir.path().join(format!("frame-{n:06}.rgba"))).unwrap();
            load_rgba(2, 2, &bytes).unwrap().pixel(0, 0)
        };
        assert_eq!(frame(0), Some(ROOT));
        assert_eq!(frame(1), Some(Color::WHITE));
        assert_eq!(frame(2), Some(ROOT));
    }

    #[test]
    fn empty_pane_set_skips_presents() {
        let mgr = PaneManager::start(headless(2, 2), ROOT, FAST).unwrap();
        mgr.remove(ROOT_PANE).unwrap();
        assert!(mgr.is_empty());
        wait_for(|| mgr.stats().skipped() >= 2);
        assert!(mgr.is_running());
        mgr.shutdown().unwrap();
    }

    #[test]
    fn shutdown_interrupts_long_wait() {
        let mgr = PaneManager::start(headless(2, 2), ROOT, Duration::from_secs(3600)).unwrap();
        wait_for(|| mgr.stats().presents() >= 1);
        let started = web_time::Instant::now();
        mgr.shutdown().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn external_cancel_stops_rotation() {
        let cancel = CancellationSource::new();
        let mgr =
            PaneManager::start_with_cancel(headless(2, 2), ROOT, FAST, cancel.clone()).unwrap();
        cancel.cancel();
        wait_for(|| !mgr.is_running());
        mgr.shutdown().unwrap();
    }

    #[test]
    fn present_failure_cancels_and_surfaces_on_shutdown() {
        let (backend, shut_down) = flaky(2);
        let cancel = CancellationSource::new();
        let mgr = PaneManager::start_with_cancel(backend, ROOT, FAST, cancel.clone()).unwrap();
        wait_for(|| cancel.is_cancelled());
        assert_eq!(mgr.stats().presents(), 2);

        match mgr.shutdown() {
            Err(RotationError::Present(e)) => assert_eq!(e.0, "flip rejected"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(shut_down.load(Ordering::SeqCst), 1);
    }

    /// Parks the rotation thread in `after_present` until released.
    struct StallingBackend {
        entered: std::sync::mpsc::Sender<()>,
        release: std::sync::mpsc::Receiver<()>,
    }

    impl DisplayBackend for StallingBackend {
        type Error = MockError;

        fn name(&self) -> &'static str {
            "stalling"
        }

        fn layout(&self) -> CanvasLayout {
            CanvasLayout::bgra(4, 4)
        }

        fn log_state(&self) {}

        fn present(&mut self, _canvas: &Canvas) -> Result<(), MockError> {
            Ok(())
        }

        fn after_present(&mut self) -> Result<(), MockError> {
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(10));
            Ok(())
        }

        fn front_index(&self) -> usize {
            0
        }

        fn shutdown(self) -> Result<(), MockError> {
            Ok(())
        }
    }

    #[test]
    fn after_present_runs_without_the_pane_lock() {
        use std::sync::mpsc;

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let backend = StallingBackend {
            entered: entered_tx,
            release: release_rx,
        };
        let mgr = PaneManager::start(backend, ROOT, FAST).unwrap();
        entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();

        // The rotation thread is parked in after_present; commands must
        // still get the pane lock.
        let (done_tx, done_rx) = mpsc::channel();
        let shared = &mgr;
        thread::scope(|s| {
            s.spawn(move || {
                let _ = done_tx.send(shared.create("side", Color::WHITE));
            });
            let created = done_rx.recv_timeout(Duration::from_secs(5));
            release_tx.send(()).unwrap();
            assert_eq!(created.expect("create stalled behind after_present"), Ok(()));
        });

        drop(release_tx);
        assert_eq!(mgr.pane_names(), vec![ROOT_PANE.to_owned(), "side".to_owned()]);
        mgr.shutdown().unwrap();
    }

    #[test]
    fn drop_releases_backend() {
        let (backend, shut_down) = flaky(u32::MAX);
        let mgr = PaneManager::start(backend, ROOT, FAST).unwrap();
        drop(mgr);
        assert_eq!(shut_down.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rotation_thread_is_named() {
        let (backend, _) = flaky(u32::MAX);
        let mgr = PaneManager::start(backend, ROOT, DEFAULT_TICK).unwrap();
        let name = mgr
            .rotation
            .as_ref()
            .and_then(|h| h.thread().name().map(str::to_owned));
        assert_eq!(name.as_deref(), Some(ROTATION_THREAD));
        mgr.shutdown().unwrap();
    }
}
