#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Remote package sources for pkgup
//!
//! A source answers "what is the newest version of these packages" and
//! serves package metadata and blob content by merkle root. Sources are
//! registered in a [`SourceSet`] in priority order; each carries its own
//! fixed-window check limit.

mod directory;
mod rate_limit;
mod registry;

pub use directory::DirSource;
pub use rate_limit::RateLimiter;
pub use registry::{RegisteredSource, SourceSet, SOURCES_FILE};

use async_trait::async_trait;
use pkgup_errors::{Error, SourceError};
use pkgup_types::{Package, PackageMeta};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CHECK_LIMIT: u64 = 10;

/// Persistable description of a registered source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    /// `file://` URL or absolute directory path
    pub url: String,
    /// Length of one check window in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    /// Checks allowed per window
    #[serde(default = "default_check_limit")]
    pub check_limit: u64,
    /// Recorded for the operator; not verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_check_limit() -> u64 {
    DEFAULT_CHECK_LIMIT
}

impl SourceConfig {
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            check_limit: DEFAULT_CHECK_LIMIT,
            pub_key: None,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, check_interval: u64, check_limit: u64) -> Self {
        self.check_interval = check_interval;
        self.check_limit = check_limit;
        self
    }

    #[must_use]
    pub fn with_pub_key(mut self, pub_key: Option<String>) -> Self {
        self.pub_key = pub_key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Resolve the URL to a local directory.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::InvalidUrl` for any scheme other than `file`,
    /// for file URLs naming a remote host and for relative paths.
    pub fn location(&self) -> Result<PathBuf, Error> {
        let raw = self.url.trim();
        let invalid = || -> Error {
            SourceError::InvalidUrl {
                url: self.url.clone(),
            }
            .into()
        };

        let bare = Path::new(raw);
        if bare.is_absolute() {
            return Ok(bare.to_path_buf());
        }

        let parsed = Url::parse(raw).map_err(|_| invalid())?;
        if parsed.scheme() != "file" {
            return Err(invalid());
        }
        parsed.to_file_path().map_err(|()| invalid())
    }
}

/// A remote package source
#[async_trait]
pub trait Source: Send + Sync {
    fn config(&self) -> &SourceConfig;

    fn id(&self) -> &str {
        &self.config().id
    }

    fn check_interval(&self) -> Duration {
        Duration::from_secs(self.config().check_interval)
    }

    fn check_limit(&self) -> u64 {
        self.config().check_limit
    }

    /// Map each requested package this source has a newer version of to the
    /// resolved package (merkle root filled in). Packages the source does
    /// not know, or whose requested merkle is already current, are absent.
    async fn available_updates(
        &self,
        requested: &[Package],
    ) -> Result<HashMap<Package, Package>, Error>;

    /// Fetch the descriptor and blob manifest of a resolved package
    async fn fetch_metadata(&self, pkg: &Package) -> Result<PackageMeta, Error>;

    /// Fetch blob content by merkle root
    async fn fetch_blob(&self, merkle: &str) -> Result<Vec<u8>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_accepts_file_url_and_path() {
        let cfg = SourceConfig::new("a", "file:///srv/repo");
        assert_eq!(cfg.location().unwrap(), PathBuf::from("/srv/repo"));
        let cfg = SourceConfig::new("b", "/srv/other");
        assert_eq!(cfg.location().unwrap(), PathBuf::from("/srv/other"));
    }

    #[test]
    fn test_location_decodes_file_urls() {
        let cases = [
            ("file:///srv/my%20repo", "/srv/my repo"),
            ("file://localhost/srv/repo", "/srv/repo"),
            ("FILE:///srv/repo", "/srv/repo"),
            ("  file:///srv/repo  ", "/srv/repo"),
        ];
        for (url, expected) in cases {
            let cfg = SourceConfig::new("x", url);
            assert_eq!(cfg.location().unwrap(), PathBuf::from(expected), "{url}");
        }
    }

    #[test]
    fn test_location_rejects_remote_and_relative() {
        for url in [
            "https://example.com/repo",
            "relative/dir",
            "file://relative",
            "file://example.com/srv/repo",
            "",
        ] {
            let err = SourceConfig::new("x", url).location().unwrap_err();
            assert!(
                matches!(err, Error::Source(SourceError::InvalidUrl { .. })),
                "{url}"
            );
        }
    }

    #[test]
    fn test_blank_pub_key_dropped() {
        let cfg = SourceConfig::new("a", "/r").with_pub_key(Some("  ".into()));
        assert!(cfg.pub_key.is_none());
    }

    #[test]
    fn test_config_serde_defaults() {
        let cfg: SourceConfig = serde_json::from_str(r#"{"id":"a","url":"/r"}"#).unwrap();
        assert_eq!(cfg.check_interval, DEFAULT_CHECK_INTERVAL_SECS);
        assert_eq!(cfg.check_limit, DEFAULT_CHECK_LIMIT);
    }
}
