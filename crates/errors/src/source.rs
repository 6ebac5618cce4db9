//! Remote source error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SourceError {
    #[error("no update available for {package}")]
    NoUpdate { package: String },

    #[error("package not known to any source: {package}")]
    UnknownPackage { package: String },

    #[error("update content not available: {merkle}")]
    NoUpdateContent { merkle: String },

    #[error("source {source_id} failed: {message}")]
    QueryFailed { source_id: String, message: String },

    #[error("source {source_id} is rate limited")]
    RateLimited { source_id: String },

    #[error("source not registered: {source_id}")]
    NotRegistered { source_id: String },

    #[error("invalid source url: {url}")]
    InvalidUrl { url: String },

    #[error("malformed metadata for {merkle}: {message}")]
    MalformedMetadata { merkle: String, message: String },
}

impl UserFacingError for SourceError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownPackage { .. } => {
                Some("Check the package name or register a source that provides it.")
            }
            Self::RateLimited { .. } => Some("Wait for the source's check window to reset."),
            Self::InvalidUrl { .. } => Some("Use a file:// URL or an absolute directory path."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::QueryFailed { .. } | Self::RateLimited { .. } | Self::NoUpdateContent { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NoUpdate { .. } => "source.no_update",
            Self::UnknownPackage { .. } => "source.unknown_package",
            Self::NoUpdateContent { .. } => "source.no_update_content",
            Self::QueryFailed { .. } => "source.query_failed",
            Self::RateLimited { .. } => "source.rate_limited",
            Self::NotRegistered { .. } => "source.not_registered",
            Self::InvalidUrl { .. } => "source.invalid_url",
            Self::MalformedMetadata { .. } => "source.malformed_metadata",
        };
        Some(code)
    }
}
