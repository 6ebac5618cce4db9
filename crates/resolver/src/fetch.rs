//! Metadata-only fetch of a resolved update

use crate::UpdateResolver;
use pkgup_errors::{Error, SourceError};
use pkgup_events::{AppEvent, EventEmitter, FailureContext, UpdateEvent};
use pkgup_types::{Package, UpdateRecord};

impl UpdateResolver {
    /// Attach the blob manifest to a resolved record, asking the source that
    /// reported the update.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::NotRegistered` if that source has since been
    /// removed, or the source's metadata failure.
    pub async fn fetch_metadata(&self, record: UpdateRecord) -> Result<UpdateRecord, Error> {
        let result = self.fetch_metadata_inner(&record).await;
        match result {
            Ok(meta) => {
                self.emit(AppEvent::Update(UpdateEvent::MetadataFetched {
                    package: record.update.name.clone(),
                    merkle: record.update.merkle.clone(),
                    blobs: meta.blobs.len(),
                }));
                Ok(record.with_meta(&meta))
            }
            Err(e) => {
                self.emit(AppEvent::Update(UpdateEvent::MetadataFailed {
                    package: record.update.name.clone(),
                    failure: FailureContext::from_error(&e),
                }));
                Err(e)
            }
        }
    }

    async fn fetch_metadata_inner(
        &self,
        record: &UpdateRecord,
    ) -> Result<pkgup_types::PackageMeta, Error> {
        let registered = self
            .sources()
            .get(&record.source_id)
            .await
            .ok_or_else(|| SourceError::NotRegistered {
                source_id: record.source_id.clone(),
            })?;
        let meta = registered.source().fetch_metadata(&record.update).await?;
        if meta.version != record.update.version && !meta.version.is_empty() {
            tracing::debug!(
                package = %record.update,
                meta_version = %meta.version,
                "metadata version differs from target record"
            );
        }
        Ok(meta)
    }

    /// Resolve `pkg` and fetch its metadata: everything short of admission.
    ///
    /// # Errors
    ///
    /// Returns the resolution or metadata failure for `pkg`.
    pub async fn fetch_update(&self, pkg: &Package) -> Result<UpdateRecord, Error> {
        let record = self.resolve_one(pkg).await?;
        self.fetch_metadata(record).await
    }
}
