//! Cooperative cancellation for the rotation thread and the command loop.
//!
//! [`CancellationToken`] is a thread-safe, cloneable signal. Threads that
//! sleep between units of work wait on it with
//! [`wait_timeout`](CancellationToken::wait_timeout) and wake as soon as
//! [`CancellationSource::cancel`] is called, not at the end of the interval.
//!
//! Threads blocked in `poll(2)` cannot wait on a condition variable. A source
//! built with [`CancellationSource::with_wake`] also owns a socket pair; on
//! cancel it writes one byte, so the read end (available from
//! [`CancellationToken::wake_fd`]) becomes readable and stays readable.
//!
//! # Example
//!
//! ```
//! use paneflip_runtime::cancellation::CancellationSource;
//! use std::time::Duration;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//!
//! let worker = std::thread::spawn(move || {
//!     while !token.wait_timeout(Duration::from_millis(10)) {
//!         // tick...
//!     }
//! });
//!
//! source.cancel();
//! worker.join().unwrap();
//! ```

#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use web_time::Duration;

/// A thread-safe, cloneable cancellation token.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationInner>,
}

/// The control handle that triggers cancellation.
///
/// Clones share one state, so any holder can cancel: the signal thread on
/// SIGTERM, the rotation thread on a fatal display error, or the command loop
/// on end of input. Dropping a source does **not** cancel.
#[derive(Clone)]
pub struct CancellationSource {
    inner: Arc<CancellationInner>,
}

struct CancellationInner {
    cancelled: AtomicBool,
    notify: (Mutex<()>, Condvar),
    wake: Option<WakePair>,
}

struct WakePair {
    tx: Mutex<UnixStream>,
    rx: UnixStream,
}

impl CancellationSource {
    /// Create a new cancellation source with an uncancelled token.
    pub fn new() -> Self {
        Self::from_parts(None)
    }

    /// Like [`new`](Self::new), plus a pollable wake descriptor.
    pub fn with_wake() -> io::Result<Self> {
        let (tx, rx) = UnixStream::pair()?;
        tx.set_nonblocking(true)?;
        rx.set_nonblocking(true)?;
        Ok(Self::from_parts(Some(WakePair {
            tx: Mutex::new(tx),
            rx,
        })))
    }

    fn from_parts(wake: Option<WakePair>) -> Self {
        Self {
            inner: Arc::new(CancellationInner {
                cancelled: AtomicBool::new(false),
                notify: (Mutex::new(()), Condvar::new()),
                wake,
            }),
        }
    }

    /// Obtain a cloneable token that observes this source's state.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Signal cancellation. All tokens observe `is_cancelled() == true`,
    /// pending `wait_timeout` calls wake and the wake descriptor turns
    /// readable. Only the first call has any effect.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let (lock, cvar) = &self.inner.notify;
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            cvar.notify_all();
        }
        if let Some(wake) = &self.inner.wake {
            let mut tx = wake.tx.lock().unwrap_or_else(|e| e.into_inner());
            // A full socket buffer is already readable.
            if let Err(err) = tx.write(&[1])
                && err.kind() != io::ErrorKind::WouldBlock
            {
                tracing::warn!(target: "paneflip.cancel", error = %err, "failed to write wake byte");
            }
        }
    }

    /// Check whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Returns `true` if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Read end of the wake socket, if the source was built with one.
    pub fn wake_fd(&self) -> Option<BorrowedFd<'_>> {
        self.inner.wake.as_ref().map(|w| w.rx.as_fd())
    }

    /// Block until either cancellation is requested or the timeout elapses.
    ///
    /// Returns `true` if cancelled, `false` if timed out.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let (lock, cvar) = &self.inner.notify;
        let mut guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let start = web_time::Instant::now();
        let mut remaining = duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let (new_guard, result) = cvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(|e| e.into_inner());
            guard = new_guard;
            if self.is_cancelled() {
                return true;
            }
            if result.timed_out() {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            remaining = duration - elapsed;
        }
    }
}
