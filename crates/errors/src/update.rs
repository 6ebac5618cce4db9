//! Update orchestration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum UpdateError {
    #[error("no package name provided")]
    NoPackageName,

    #[error("supplied merkle root is empty")]
    EmptyMerkle,

    #[error("no update available for {package}")]
    NoUpdateAvailable { package: String },

    #[error("error while checking for update to {package}: {message}")]
    CheckFailed { package: String, message: String },

    #[error("update daemon has not been started")]
    NotStarted,

    #[error("activation monitor is closed")]
    MonitorClosed,

    #[error("blob {blob} for {package} could not be fetched: {message}")]
    BlobFetchFailed {
        package: String,
        blob: String,
        message: String,
    },
}

impl UserFacingError for UpdateError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoPackageName => Some("Pass a package name such as /system/foo."),
            Self::NotStarted => Some("Call start() during process setup before serving requests."),
            Self::MonitorClosed => Some("The daemon is shutting down; retry after restart."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CheckFailed { .. } | Self::BlobFetchFailed { .. } | Self::MonitorClosed
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NoPackageName => "update.no_package_name",
            Self::EmptyMerkle => "update.empty_merkle",
            Self::NoUpdateAvailable { .. } => "update.no_update_available",
            Self::CheckFailed { .. } => "update.check_failed",
            Self::NotStarted => "update.not_started",
            Self::MonitorClosed => "update.monitor_closed",
            Self::BlobFetchFailed { .. } => "update.blob_fetch_failed",
        };
        Some(code)
    }
}
