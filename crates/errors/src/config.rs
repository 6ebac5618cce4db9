//! Configuration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Problems with `config.toml`, `PKGUP_*` overrides or builder input
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("config file is not valid TOML: {message}")]
    ParseError { message: String },

    #[error("missing required setting: {field}")]
    MissingField { field: String },

    /// `field` is either a dotted file key or the environment variable
    /// that carried the value.
    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => {
                Some("Point --config at an existing file or drop the flag to run on defaults.")
            }
            Self::ParseError { .. } => Some("Fix the TOML syntax in the config file."),
            Self::MissingField { field } if field == "root" => {
                Some("Set general.root in config.toml, export PKGUP_ROOT or pass --root.")
            }
            Self::MissingField { .. } => None,
            Self::InvalidValue { field, .. } => Some(match field.as_str() {
                "PKGUP_ROOT" => "PKGUP_ROOT must be a non-empty path; unset it to use the default.",
                f if f.starts_with("PKGUP_") => "Numeric PKGUP_* overrides take a positive integer.",
                f if f.starts_with("monitor.") => {
                    "monitor.queue_capacity and monitor.fetch_concurrency must be at least 1."
                }
                f if f.starts_with("sources.") => {
                    "sources.check_interval (seconds) and sources.check_limit must be at least 1."
                }
                _ => "Correct the value named in the message.",
            }),
        }
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::ParseError { .. } => "config.parse_error",
            Self::MissingField { .. } => "config.missing_field",
            Self::InvalidValue { .. } => "config.invalid_value",
        };
        Some(code)
    }
}
