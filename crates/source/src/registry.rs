use crate::{DirSource, RateLimiter, Source, SourceConfig};
use pkgup_errors::{Error, StorageError};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

/// File under the sources directory holding the persisted configs
pub const SOURCES_FILE: &str = "sources.json";

/// A source together with its check-window state
#[derive(Clone)]
pub struct RegisteredSource {
    source: Arc<dyn Source>,
    limiter: Arc<RateLimiter>,
}

impl RegisteredSource {
    #[must_use]
    pub fn new(source: Arc<dyn Source>) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            source.check_interval(),
            source.check_limit(),
        ));
        Self { source, limiter }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.source.id()
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    /// Consume one check from this source's window
    #[must_use]
    pub fn try_check(&self) -> bool {
        self.limiter.try_acquire()
    }
}

impl std::fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("id", &self.id())
            .field("limiter", &self.limiter)
            .finish()
    }
}

/// Ordered set of sources; earlier registrations take priority
///
/// Cloning shares the underlying set. Readers take a snapshot so a
/// resolution pass never observes a half-applied add or remove.
#[derive(Clone, Default, Debug)]
pub struct SourceSet {
    inner: Arc<RwLock<Vec<RegisteredSource>>>,
}

impl SourceSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Returns false if the id is already taken.
    pub async fn add(&self, source: Arc<dyn Source>) -> bool {
        let mut sources = self.inner.write().await;
        if sources.iter().any(|s| s.id() == source.id()) {
            return false;
        }
        tracing::debug!(source = source.id(), "registered source");
        sources.push(RegisteredSource::new(source));
        true
    }

    /// Remove a source by id. Returns whether one was removed.
    pub async fn remove(&self, id: &str) -> bool {
        let mut sources = self.inner.write().await;
        let before = sources.len();
        sources.retain(|s| s.id() != id);
        before != sources.len()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .iter()
            .map(|s| s.id().to_string())
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<RegisteredSource> {
        self.inner
            .read()
            .await
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    pub async fn snapshot(&self) -> Vec<RegisteredSource> {
        self.inner.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Persist every source config to `<dir>/sources.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save(&self, dir: &Path) -> Result<(), Error> {
        let configs: Vec<SourceConfig> = self
            .inner
            .read()
            .await
            .iter()
            .map(|s| s.source.config().clone())
            .collect();
        let json = serde_json::to_vec_pretty(&configs)?;

        fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, dir))?;
        let path = dir.join(SOURCES_FILE);
        let tmp = dir.join(format!(".{SOURCES_FILE}.tmp"));
        fs::write(&tmp, json)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &tmp))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &path))?;
        Ok(())
    }

    /// Register the directory sources persisted in `<dir>/sources.json`.
    ///
    /// Ids already present are left alone; entries whose URL is unusable are
    /// skipped with a warning. Returns the number of sources added.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self, dir: &Path) -> Result<usize, Error> {
        let path = dir.join(SOURCES_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io_with_path(&e, path)),
        };
        let configs: Vec<SourceConfig> = serde_json::from_slice(&bytes)?;

        let mut added = 0;
        for config in configs {
            let id = config.id.clone();
            match DirSource::new(config) {
                Ok(source) => {
                    if self.add(Arc::new(source)).await {
                        added += 1;
                    }
                }
                Err(e) => tracing::warn!(source = %id, error = %e, "skipping persisted source"),
            }
        }
        Ok(added)
    }
}
