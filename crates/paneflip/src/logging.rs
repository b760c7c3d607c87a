//! Global tracing subscriber.
//!
//! Events go to stderr; stdout carries protocol replies only.

use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{AppError, Result};

/// `RUST_LOG` wins over the configured level when it is set and non-empty.
fn directives(env: Option<String>, configured: &str) -> String {
    match env {
        Some(env) if !env.trim().is_empty() => env,
        _ => configured.to_owned(),
    }
}

/// Install the stderr subscriber. Fails if one is already installed or the
/// filter does not parse.
pub fn init(configured: &str) -> Result<()> {
    let directives = directives(std::env::var(EnvFilter::DEFAULT_ENV).ok(), configured);
    let filter = EnvFilter::try_new(&directives).map_err(|e| AppError::Logging {
        message: format!("bad filter {directives:?}: {e}"),
    })?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| AppError::Logging {
            message: e.to_string(),
        })
}
