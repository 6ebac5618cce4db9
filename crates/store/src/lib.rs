#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Content-addressed package store for pkgup
//!
//! Blobs live under `<root>/blobs/<merkle>` and admitted package metadata
//! under `<root>/meta/<merkle>.json`. Newly stored blobs are reported upward
//! through an [`ActivationSink`] so whoever tracks outstanding blobs can
//! fulfill them.

mod file_store;

pub use file_store::FsBlobStore;

use async_trait::async_trait;
use pkgup_errors::Error;
use pkgup_types::UpdateRecord;

/// Storage collaborator driven by the activation monitor
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// True if the blob content is already present
    async fn has_blob(&self, merkle: &str) -> bool;

    /// Retrieve a blob, store it, and notify the activation sink.
    async fn fetch_blob(&self, merkle: &str) -> Result<(), Error>;

    /// Durably record that a package update has been accepted for installation
    async fn admit(&self, record: &UpdateRecord) -> Result<(), Error>;
}

/// Receiver of "content is now present" notifications
#[async_trait]
pub trait ActivationSink: Send + Sync {
    async fn blobs_activated(&self, blobs: Vec<String>) -> Result<(), Error>;
}
