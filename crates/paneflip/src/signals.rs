//! SIGINT/SIGTERM handling.
//!
//! A background thread waits on a `signal-hook` iterator and turns the first
//! termination signal into a cancellation, which stops the rotation thread
//! and wakes the command loop. The process then shuts down through the
//! normal path instead of exiting from the handler.

use std::io;
use std::thread::{self, JoinHandle};

use paneflip_runtime::CancellationSource;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};

/// Owns the signal thread. Dropping or closing the guard joins it.
#[derive(Debug)]
pub struct SignalGuard {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalGuard {
    pub fn install(cancel: CancellationSource) -> io::Result<Self> {
        Self::for_signals(&[SIGINT, SIGTERM], cancel)
    }

    fn for_signals(signals: &[i32], cancel: CancellationSource) -> io::Result<Self> {
        let mut signals = Signals::new(signals).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("paneflip-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    tracing::warn!(target: "paneflip.signal", signal, "termination signal received, shutting down");
                    cancel.cancel();
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Stop listening and join the thread.
    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.stop();
    }
}
