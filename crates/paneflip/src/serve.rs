//! Process lifecycle: backend selection, pane manager, command loop and
//! orderly shutdown.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;

use paneflip_backend::{DisplayBackend, HeadlessBackend};
#[cfg(target_os = "linux")]
use paneflip_kms::KmsBackend;
use paneflip_runtime::{CancellationSource, PaneManager};

use crate::commands::{CommandLoop, LoopExit};
use crate::config::{BackendKind, Config};
use crate::error::{AppError, Result};
use crate::signals::SignalGuard;

/// Open the configured backend and serve stdin until shutdown.
pub fn run_config(config: &Config) -> Result<()> {
    tracing::info!(target: "paneflip", backend = %config.backend, "starting");
    match config.backend {
        #[cfg(target_os = "linux")]
        BackendKind::Kms => run_backend(KmsBackend::open(&config.kms())?, config),
        #[cfg(not(target_os = "linux"))]
        BackendKind::Kms => Err(crate::config::ConfigError::Invalid(config.validate()).into()),
        BackendKind::Headless => run_backend(HeadlessBackend::open(config.headless())?, config),
    }
}

fn run_backend<B>(backend: B, config: &Config) -> Result<()>
where
    B: DisplayBackend + 'static,
    AppError: From<B::Error>,
{
    let cancel = CancellationSource::with_wake()?;
    let signals = SignalGuard::install(cancel.clone())?;
    // Unbuffered, so poll readiness matches what a read will return.
    let stdin = File::from(io::stdin().as_fd().try_clone_to_owned()?);
    let served = serve(backend, config, cancel, stdin, io::stdout().lock());
    signals.close();
    let exit = served?;
    tracing::info!(target: "paneflip", ?exit, "stopped");
    Ok(())
}

/// Run one session on an already opened backend.
///
/// Returns once `input` ends or `cancel` fires (signal, or a fatal present
/// error on the rotation thread). Either way the rotation thread is stopped
/// and the backend released before returning; a display failure takes
/// precedence over an input error.
pub fn serve<B, R, W>(
    backend: B,
    config: &Config,
    cancel: CancellationSource,
    input: R,
    output: W,
) -> Result<LoopExit>
where
    B: DisplayBackend + 'static,
    AppError: From<B::Error>,
    R: Read + AsFd,
    W: Write,
{
    backend.log_state();
    let manager = PaneManager::start_with_cancel(
        backend,
        config.root_color(),
        config.tick_interval(),
        cancel.clone(),
    )
    .map_err(AppError::from_rotation)?;

    let looped = CommandLoop::new(&manager, cancel.token(), output).run(input);
    if matches!(looped, Ok(LoopExit::EndOfInput)) {
        tracing::info!(target: "paneflip", "input closed, shutting down");
    }
    cancel.cancel();

    manager.shutdown().map_err(AppError::from_rotation)?;
    Ok(looped?)
}
