use serde::{Deserialize, Serialize};

/// Resolution and metadata-fetch events emitted by the resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdateEvent {
    /// A resolution pass started for a batch of packages
    CheckStarted {
        requested: Vec<String>,
        sources: usize,
    },

    /// A source reported an update for a requested package
    UpdateAvailable {
        package: String,
        version: String,
        merkle: String,
        source_id: String,
    },

    /// No source had an update for the package
    NoUpdate { package: String },

    /// A source query failed; other sources are still consulted
    SourceFailed {
        source_id: String,
        failure: super::FailureContext,
    },

    /// A source was skipped because its check window is exhausted
    SourceRateLimited {
        source_id: String,
        check_limit: u64,
        interval_secs: u64,
    },

    /// Package metadata was retrieved for a resolved update
    MetadataFetched {
        package: String,
        merkle: String,
        blobs: usize,
    },

    /// Package metadata could not be retrieved
    MetadataFailed {
        package: String,
        failure: super::FailureContext,
    },
}
