use paneflip_backend::HeadlessError;
#[cfg(target_os = "linux")]
use paneflip_kms::KmsError;
use paneflip_runtime::{PaneError, RotationError};
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, AppError>;

/// Process-level failures. All of them end the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("cannot install log subscriber: {message}")]
    Logging { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(target_os = "linux")]
    #[error("display error: {0}")]
    Kms(#[from] KmsError),

    #[error("display error: {0}")]
    Headless(#[from] HeadlessError),

    #[error("cannot create root pane: {0}")]
    RootPane(PaneError),

    #[error("rotation thread panicked")]
    RotationPanicked,
}

impl AppError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Logging { .. } => 2,
            #[cfg(target_os = "linux")]
            Self::Kms(_) => 3,
            Self::Headless(_) => 3,
            Self::RootPane(_) | Self::RotationPanicked => 4,
            Self::Io(_) => 1,
        }
    }

    /// Flatten a rotation failure, keeping the backend's own error.
    pub fn from_rotation<E>(err: RotationError<E>) -> Self
    where
        AppError: From<E>,
    {
        match err {
            RotationError::Spawn(e) => Self::Io(e),
            RotationError::RootPane(e) => Self::RootPane(e),
            RotationError::Present(e) | RotationError::Shutdown(e) => e.into(),
            RotationError::Panicked => Self::RotationPanicked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_class() {
        let config = AppError::Config(ConfigError::Invalid(vec!["x".into()]));
        assert_eq!(config.exit_code(), 2);
        assert_eq!(AppError::RotationPanicked.exit_code(), 4);
        assert_eq!(AppError::Io(std::io::Error::other("x")).exit_code(), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn kms_failures_are_display_errors() {
        assert_eq!(AppError::Kms(KmsError::NoConnector).exit_code(), 3);
    }

    #[test]
    fn rotation_present_error_keeps_backend_variant() {
        let err = AppError::from_rotation(RotationError::Present(HeadlessError::ZeroArea {
            width: 0,
            height: 1,
        }));
        assert!(matches!(err, AppError::Headless(_)));
        assert_eq!(err.exit_code(), 3);

        let err = AppError::from_rotation::<HeadlessError>(RotationError::RootPane(PaneError::OutOfMemory));
        assert_eq!(err.to_string(), "cannot create root pane: oom");
    }
}
