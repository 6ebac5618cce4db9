//! Update records flowing through the resolve/fetch/activate pipeline

use crate::Package;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Package metadata as published by a source: the finalized descriptor and
/// the blob manifest the package depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMeta {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub blobs: Vec<String>,
}

/// The result of resolving one requested package.
///
/// Owned by the fetch stage until it is handed to the activation monitor;
/// treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Package as the caller asked for it
    pub orig: Package,
    /// Package as the source resolved it, with the merkle root filled in
    pub update: Package,
    /// Content blobs the resolved package depends on
    #[serde(default)]
    pub blobs: BTreeSet<String>,
    /// Identifier of the source that reported the update
    pub source_id: String,
}

impl UpdateRecord {
    /// Create a record for a freshly resolved update with no blob manifest yet
    pub fn new(orig: Package, update: Package, source_id: impl Into<String>) -> Self {
        Self {
            orig,
            update,
            blobs: BTreeSet::new(),
            source_id: source_id.into(),
        }
    }

    /// Merkle root of the resolved package
    #[must_use]
    pub fn merkle(&self) -> &str {
        &self.update.merkle
    }

    /// Attach the blob manifest from fetched metadata
    #[must_use]
    pub fn with_meta(mut self, meta: &PackageMeta) -> Self {
        self.blobs = meta.blobs.iter().cloned().collect();
        self
    }
}
