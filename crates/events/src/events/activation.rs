use serde::{Deserialize, Serialize};

/// Activation monitor events: admission, blob backlog, activation and shutdown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActivationEvent {
    /// A fetched update was admitted to the store and registered for tracking
    PackageAdmitted {
        package: String,
        merkle: String,
        outstanding: usize,
    },

    /// A fetch was issued for a blob the package still needs
    BlobRequested { blob: String },

    /// The store reported a blob as present
    BlobActivated { blob: String },

    /// A blob fetch issued by the monitor failed
    BlobFetchFailed {
        blob: String,
        failure: super::FailureContext,
    },

    /// Every blob of a package is present and it was committed to the index
    PackageActivated {
        package: String,
        merkle: String,
        waiters: usize,
    },

    /// Committing an activated package to durable storage failed
    CommitFailed {
        package: String,
        merkle: String,
        failure: super::FailureContext,
    },

    /// The monitor drained its inbox and stopped
    MonitorStopped {
        pending_requests: usize,
        installing: usize,
    },
}
