//! Sending side of the activation monitor

use crate::request::MonitorRequest;
use async_trait::async_trait;
use pkgup_errors::{Error, UpdateError};
use pkgup_store::ActivationSink;
use pkgup_types::UpdateRecord;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Receiving side handed to the monitor
#[derive(Debug)]
pub struct MonitorInbox {
    pub(crate) rx: mpsc::Receiver<MonitorRequest>,
    pub(crate) shutdown: CancellationToken,
}

/// Cloneable handle for submitting requests to the monitor
///
/// Sends wait for inbox capacity, so a monitor that falls behind slows its
/// notifiers down instead of dropping their events.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorRequest>,
    shutdown: CancellationToken,
}

/// Pending answer to a completion request
///
/// Dropping it abandons the request; the monitor forgets the reply slot the
/// next time it looks at the package.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<String, Error>>,
}

impl Completion {
    /// Wait for full activation and return the package merkle root.
    ///
    /// # Errors
    ///
    /// Returns the admission, blob fetch or commit failure, or
    /// `UpdateError::MonitorClosed` if the monitor stopped first.
    pub async fn wait(self) -> Result<String, Error> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(UpdateError::MonitorClosed.into()))
    }
}

impl MonitorHandle {
    /// Create a handle and the inbox the monitor will drain
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, MonitorInbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shutdown = CancellationToken::new();
        (
            Self {
                tx,
                shutdown: shutdown.clone(),
            },
            MonitorInbox { rx, shutdown },
        )
    }

    async fn send(&self, request: MonitorRequest) -> Result<(), Error> {
        if self.shutdown.is_cancelled() {
            request.reject(&UpdateError::MonitorClosed.into());
            return Err(UpdateError::MonitorClosed.into());
        }
        self.tx
            .send(request)
            .await
            .map_err(|_| UpdateError::MonitorClosed.into())
    }

    /// Report a blob as present
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::MonitorClosed` after shutdown.
    pub async fn fulfill(&self, blob: impl Into<String>) -> Result<(), Error> {
        self.send(MonitorRequest::Fulfill { blob: blob.into() })
            .await
    }

    /// Report a failed blob fetch
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::MonitorClosed` after shutdown.
    pub async fn blob_failed(&self, blob: impl Into<String>, error: Error) -> Result<(), Error> {
        self.send(MonitorRequest::BlobFailed {
            blob: blob.into(),
            error,
        })
        .await
    }

    /// Admit an update and wait until it is durably registered.
    ///
    /// # Errors
    ///
    /// Returns the admission failure or `UpdateError::MonitorClosed`.
    pub async fn write(&self, record: UpdateRecord) -> Result<String, Error> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorRequest::Write { record, reply }).await?;
        rx.await
            .unwrap_or_else(|_| Err(UpdateError::MonitorClosed.into()))
    }

    /// Admit an update and return a handle that resolves at full activation.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::MonitorClosed` if the request cannot be queued.
    pub async fn complete(&self, record: UpdateRecord) -> Result<Completion, Error> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorRequest::Complete { record, reply })
            .await?;
        Ok(Completion { rx })
    }

    /// Stop the monitor. Queued and pending requests are answered with
    /// `UpdateError::MonitorClosed`.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[async_trait]
impl ActivationSink for MonitorHandle {
    async fn blobs_activated(&self, blobs: Vec<String>) -> Result<(), Error> {
        for blob in blobs {
            self.fulfill(blob).await?;
        }
        Ok(())
    }
}
