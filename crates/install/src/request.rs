//! Messages accepted by the activation monitor

use pkgup_errors::Error;
use pkgup_types::UpdateRecord;
use tokio::sync::oneshot;

/// Single-use reply slot carrying the package merkle root or the failure
pub type Reply = oneshot::Sender<Result<String, Error>>;

#[derive(Debug)]
pub enum MonitorRequest {
    /// The store reports blob content as present
    Fulfill { blob: String },

    /// A fetch issued by the monitor failed
    BlobFailed { blob: String, error: Error },

    /// Admit the update; reply once it is durably registered
    Write { record: UpdateRecord, reply: Reply },

    /// Admit the update; reply once every blob is present and it is committed
    Complete { record: UpdateRecord, reply: Reply },
}

impl MonitorRequest {
    /// Answer the reply slot, if any, with `error`
    pub fn reject(self, error: &Error) {
        match self {
            Self::Write { reply, .. } | Self::Complete { reply, .. } => {
                let _ = reply.send(Err(error.clone()));
            }
            Self::Fulfill { .. } | Self::BlobFailed { .. } => {}
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fulfill { .. } => "fulfill",
            Self::BlobFailed { .. } => "blob_failed",
            Self::Write { .. } => "write",
            Self::Complete { .. } => "complete",
        }
    }
}
