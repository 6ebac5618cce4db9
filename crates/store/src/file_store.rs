//! Filesystem-backed blob store
//!
//! Blob content is pulled from the registered sources in priority order and
//! written through a uniquely named temporary file so a partially written
//! blob is never visible under its merkle root.

use crate::{ActivationSink, PackageStore};
use async_trait::async_trait;
use pkgup_errors::{Error, SourceError, StorageError};
use pkgup_source::SourceSet;
use pkgup_types::{PackageMeta, UpdateRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

#[derive(Clone)]
pub struct FsBlobStore {
    blobs_path: PathBuf,
    meta_path: PathBuf,
    sources: SourceSet,
    sink: Option<Arc<dyn ActivationSink>>,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: &Path, sources: SourceSet) -> Self {
        Self {
            blobs_path: root.join("blobs"),
            meta_path: root.join("meta"),
            sources,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ActivationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Storage path for a blob
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlobNotFound` for digests that are not a plain
    /// file name.
    pub fn blob_path(&self, merkle: &str) -> Result<PathBuf, Error> {
        checked_name(merkle)?;
        Ok(self.blobs_path.join(merkle))
    }

    /// Storage path for admitted metadata
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlobNotFound` for digests that are not a plain
    /// file name.
    pub fn meta_path(&self, merkle: &str) -> Result<PathBuf, Error> {
        checked_name(merkle)?;
        Ok(self.meta_path.join(format!("{merkle}.json")))
    }

    /// Read stored blob content
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is not present.
    pub async fn read_blob(&self, merkle: &str) -> Result<Vec<u8>, Error> {
        let path = self.blob_path(merkle)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::BlobNotFound {
                    merkle: merkle.to_string(),
                }
                .into()
            } else {
                StorageError::from_io_with_path(&e, &path).into()
            }
        })
    }

    /// Read admitted metadata
    ///
    /// # Errors
    ///
    /// Returns an error if nothing was admitted under `merkle` or the record
    /// cannot be parsed.
    pub async fn read_meta(&self, merkle: &str) -> Result<PackageMeta, Error> {
        let path = self.meta_path(merkle)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Every admitted metadata record as `(merkle, meta)`, ordered by merkle.
    ///
    /// Temporary files are skipped. A record that cannot be parsed is logged
    /// and skipped so one damaged file does not hide the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the meta directory exists but cannot be read.
    pub async fn admitted(&self) -> Result<Vec<(String, PackageMeta)>, Error> {
        let mut entries = match fs::read_dir(&self.meta_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::from_io_with_path(&e, &self.meta_path).into()),
        };

        let mut admitted = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &self.meta_path))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(merkle) = file_name.strip_suffix(".json") else {
                continue;
            };
            if checked_name(merkle).is_err() {
                continue;
            }
            match self.read_meta(merkle).await {
                Ok(meta) => admitted.push((merkle.to_string(), meta)),
                Err(e) => tracing::warn!(merkle, error = %e, "skipping unreadable metadata"),
            }
        }
        admitted.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(admitted)
    }

    /// Write `bytes` to `dest` via a temporary file in the same directory.
    ///
    /// Returns false if `dest` already existed.
    async fn store_atomic(dest: &Path, bytes: &[u8]) -> Result<bool, Error> {
        if fs::try_exists(dest).await.unwrap_or(false) {
            return Ok(false);
        }
        let parent_dir = dest.parent().ok_or_else(|| StorageError::IoError {
            message: "failed to get parent directory".to_string(),
        })?;
        fs::create_dir_all(parent_dir)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, parent_dir))?;

        let temp_path = parent_dir.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&temp_path, bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::IoError {
                message: format!("failed to write temp file: {e}"),
            }
            .into());
        }

        match fs::rename(&temp_path, dest).await {
            Ok(()) => Ok(true),
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    Ok(false)
                } else {
                    Err(StorageError::IoError {
                        message: format!("failed to move temp file into store: {e}"),
                    }
                    .into())
                }
            }
        }
    }

    async fn notify(&self, merkle: &str) -> Result<(), Error> {
        match &self.sink {
            Some(sink) => sink.blobs_activated(vec![merkle.to_string()]).await,
            None => Ok(()),
        }
    }

    async fn download(&self, merkle: &str) -> Result<Vec<u8>, Error> {
        let mut last_err: Option<Error> = None;
        for registered in self.sources.snapshot().await {
            match registered.source().fetch_blob(merkle).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    tracing::debug!(source = registered.id(), merkle, error = %e, "blob fetch failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            SourceError::NoUpdateContent {
                merkle: merkle.to_string(),
            }
            .into()
        }))
    }
}

#[async_trait]
impl PackageStore for FsBlobStore {
    async fn has_blob(&self, merkle: &str) -> bool {
        match self.blob_path(merkle) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn fetch_blob(&self, merkle: &str) -> Result<(), Error> {
        let dest = self.blob_path(merkle)?;
        if !fs::try_exists(&dest).await.unwrap_or(false) {
            let bytes = self.download(merkle).await?;
            if Self::store_atomic(&dest, &bytes).await? {
                tracing::debug!(merkle, size = bytes.len(), "stored blob");
            }
        }
        // Notify even when already present: a waiter may have registered
        // after the earlier notification was delivered.
        self.notify(merkle).await
    }

    async fn admit(&self, record: &UpdateRecord) -> Result<(), Error> {
        let merkle = record.merkle();
        let dest = self.meta_path(merkle)?;
        let meta = PackageMeta {
            name: record.update.name.clone(),
            version: record.update.version.clone(),
            blobs: record.blobs.iter().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&meta)?;
        Self::store_atomic(&dest, &json).await?;
        Ok(())
    }
}

fn checked_name(merkle: &str) -> Result<(), Error> {
    let ok = !merkle.is_empty()
        && !merkle.starts_with('.')
        && !merkle.contains(['/', '\\'])
        && merkle.trim() == merkle;
    if ok {
        Ok(())
    } else {
        Err(StorageError::BlobNotFound {
            merkle: merkle.to_string(),
        }
        .into())
    }
}
