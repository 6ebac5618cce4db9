//! Source registry requests

use crate::ControlServer;
use pkgup_errors::Error;
use pkgup_events::EventEmitter;
use pkgup_source::{DirSource, SourceConfig};
use std::sync::Arc;

impl ControlServer {
    /// Register a directory-backed source under `url` and persist the
    /// registry.
    ///
    /// `rate_limit` is the number of checks allowed per check interval; zero
    /// keeps the configured default. The public key is recorded only.
    /// Returns false if a source with this url is already registered.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::InvalidUrl` for an unusable url, or the storage
    /// error if the registry cannot be saved.
    pub async fn add_src(
        &self,
        url: &str,
        rate_limit: u64,
        pub_key: Option<String>,
    ) -> Result<bool, Error> {
        let defaults = self.inner.source_defaults;
        let limit = if rate_limit == 0 {
            defaults.check_limit
        } else {
            rate_limit
        };
        let config = SourceConfig::new(url, url)
            .with_limits(defaults.check_interval, limit)
            .with_pub_key(pub_key);
        let source = DirSource::new(config)?;

        if !self.inner.sources.add(Arc::new(source)).await {
            return Ok(false);
        }
        self.inner.sources.save(&self.sources_dir()).await?;
        self.emit_debug(format!("added source {url}"));
        Ok(true)
    }

    /// Remove the source registered under `url`.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the registry cannot be saved.
    pub async fn remove_src(&self, url: &str) -> Result<bool, Error> {
        if !self.inner.sources.remove(url).await {
            return Ok(false);
        }
        self.inner.sources.save(&self.sources_dir()).await?;
        self.emit_debug(format!("removed source {url}"));
        Ok(true)
    }

    /// Registered source ids in priority order
    pub async fn list_srcs(&self) -> Vec<String> {
        self.inner.sources.ids().await
    }
}
