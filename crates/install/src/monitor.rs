//! The activation monitor
//!
//! One task owns all mutation of the installation index's blob bookkeeping.
//! It drains a single bounded inbox of blob notifications and admission
//! requests, issues blob fetches, and releases completion waiters when a
//! package's last outstanding blob arrives.

use crate::handle::{MonitorHandle, MonitorInbox};
use crate::request::{MonitorRequest, Reply};
use crate::resource::{acquire_semaphore_permit, create_semaphore};
use pkgup_errors::{Error, UpdateError};
use pkgup_events::{ActivationEvent, AppEvent, EventEmitter, EventSender, FailureContext};
use pkgup_index::{Activation, Admission, DynamicIndex};
use pkgup_store::PackageStore;
use pkgup_types::UpdateRecord;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

/// Tuning for the monitor
#[derive(Debug, Clone)]
pub struct ActivationConfig {
    /// Inbox capacity; full inbox blocks senders
    pub queue_capacity: usize,
    /// Blob fetches allowed in flight
    pub fetch_concurrency: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 5,
            fetch_concurrency: 4,
        }
    }
}

/// How a registration ended up
enum Registration {
    /// Still waiting on blobs
    Pending,
    /// Everything was present; committed with this outcome
    Activated(Result<(), Error>),
}

pub struct ActivationMonitor {
    index: Arc<DynamicIndex>,
    store: Arc<dyn PackageStore>,
    inbox: MonitorInbox,
    handle: MonitorHandle,
    /// package merkle -> completion reply slots
    pending: HashMap<String, Vec<Reply>>,
    /// blobs with a fetch task running
    in_flight: HashSet<String>,
    fetch_permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    tx: Option<EventSender>,
}

impl EventEmitter for ActivationMonitor {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl ActivationMonitor {
    #[must_use]
    pub fn new(
        index: Arc<DynamicIndex>,
        store: Arc<dyn PackageStore>,
        handle: MonitorHandle,
        inbox: MonitorInbox,
        config: &ActivationConfig,
    ) -> Self {
        Self {
            index,
            store,
            inbox,
            handle,
            pending: HashMap::new(),
            in_flight: HashSet::new(),
            fetch_permits: create_semaphore(config.fetch_concurrency),
            tasks: JoinSet::new(),
            tx: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Run the monitor on its own task
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process requests until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        let shutdown = self.inbox.shutdown.clone();
        loop {
            let request = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                request = self.inbox.rx.recv() => request,
            };
            let Some(request) = request else {
                break;
            };
            self.handle_request(request).await;
            while self.tasks.try_join_next().is_some() {}
        }
        self.stop();
    }

    async fn handle_request(&mut self, request: MonitorRequest) {
        tracing::trace!(kind = request.kind(), "monitor request");
        match request {
            MonitorRequest::Fulfill { blob } => self.on_fulfill(&blob),
            MonitorRequest::BlobFailed { blob, error } => self.on_blob_failed(&blob, &error),
            MonitorRequest::Write { record, reply } => {
                let result = match self.register(&record).await {
                    Ok(Registration::Pending) => Ok(record.merkle().to_string()),
                    Ok(Registration::Activated(result)) => {
                        result.map(|()| record.merkle().to_string())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            MonitorRequest::Complete { record, reply } => {
                self.prune_abandoned();
                match self.register(&record).await {
                    Ok(Registration::Pending) => {
                        self.pending
                            .entry(record.merkle().to_string())
                            .or_default()
                            .push(reply);
                    }
                    Ok(Registration::Activated(result)) => {
                        let _ = reply.send(result.map(|()| record.merkle().to_string()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
        }
    }

    /// Admit `record` to the store and track its missing blobs.
    ///
    /// Blobs already present are filtered out first, so a package whose
    /// content arrived before registration activates here rather than
    /// waiting for a notification that already happened.
    async fn register(&mut self, record: &UpdateRecord) -> Result<Registration, Error> {
        let merkle = record.merkle();
        if merkle.trim().is_empty() {
            return Err(UpdateError::EmptyMerkle.into());
        }

        self.store.admit(record).await?;

        let mut missing = Vec::new();
        for blob in &record.blobs {
            if !self.store.has_blob(blob).await {
                missing.push(blob.clone());
            }
        }

        match self
            .index
            .add_needs(merkle, record.update.clone(), missing)
        {
            Admission::Registered { outstanding } => {
                self.emit_correlated(
                    merkle,
                    AppEvent::Activation(ActivationEvent::PackageAdmitted {
                        package: record.update.to_string(),
                        merkle: merkle.to_string(),
                        outstanding: outstanding.len(),
                    }),
                );
                self.request_blobs(outstanding);
                Ok(Registration::Pending)
            }
            Admission::AlreadyInstalling { outstanding } => {
                // Re-issue fetches that are no longer running, e.g. after a failure.
                self.request_blobs(outstanding);
                Ok(Registration::Pending)
            }
            Admission::Activated(activation) => {
                let result = activation.result.clone();
                self.on_activation(activation);
                Ok(Registration::Activated(result))
            }
        }
    }

    fn request_blobs(&mut self, blobs: BTreeSet<String>) {
        for blob in blobs {
            if !self.in_flight.insert(blob.clone()) {
                continue;
            }
            self.emit(AppEvent::Activation(ActivationEvent::BlobRequested {
                blob: blob.clone(),
            }));

            let store = self.store.clone();
            let handle = self.handle.clone();
            let permits = self.fetch_permits.clone();
            self.tasks.spawn(async move {
                let outcome = match acquire_semaphore_permit(permits, "blob fetch").await {
                    Ok(_permit) => store.fetch_blob(&blob).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = outcome {
                    let _ = handle.blob_failed(blob, e).await;
                }
            });
        }
    }

    fn on_fulfill(&mut self, blob: &str) {
        self.in_flight.remove(blob);
        self.emit(AppEvent::Activation(ActivationEvent::BlobActivated {
            blob: blob.to_string(),
        }));
        for activation in self.index.fulfill(blob) {
            self.on_activation(activation);
        }
        self.prune_abandoned();
    }

    fn on_blob_failed(&mut self, blob: &str, error: &Error) {
        self.in_flight.remove(blob);
        self.emit(AppEvent::Activation(ActivationEvent::BlobFetchFailed {
            blob: blob.to_string(),
            failure: FailureContext::from_error(error),
        }));

        // The registration stays; only the callers waiting on it are told.
        for root in self.index.waiters_of(blob) {
            let Some(waiters) = self.pending.remove(&root) else {
                continue;
            };
            let failure: Error = UpdateError::BlobFetchFailed {
                package: root.clone(),
                blob: blob.to_string(),
                message: error.to_string(),
            }
            .into();
            for reply in waiters {
                let _ = reply.send(Err(failure.clone()));
            }
        }
    }

    fn on_activation(&mut self, activation: Activation) {
        let Activation {
            merkle,
            package,
            result,
        } = activation;
        let waiters: Vec<Reply> = self
            .pending
            .remove(&merkle)
            .unwrap_or_default()
            .into_iter()
            .filter(|reply| !reply.is_closed())
            .collect();

        match &result {
            Ok(()) => self.emit_correlated(
                &merkle,
                AppEvent::Activation(ActivationEvent::PackageActivated {
                    package: package.to_string(),
                    merkle: merkle.clone(),
                    waiters: waiters.len(),
                }),
            ),
            Err(e) => self.emit_correlated(
                &merkle,
                AppEvent::Activation(ActivationEvent::CommitFailed {
                    package: package.to_string(),
                    merkle: merkle.clone(),
                    failure: FailureContext::from_error(e),
                }),
            ),
        }

        for reply in waiters {
            let _ = reply.send(result.clone().map(|()| merkle.clone()));
        }
    }

    /// Forget reply slots whose callers went away
    fn prune_abandoned(&mut self) {
        self.pending.retain(|_, waiters| {
            waiters.retain(|reply| !reply.is_closed());
            !waiters.is_empty()
        });
    }

    fn stop(&mut self) {
        self.inbox.rx.close();
        self.tasks.abort_all();

        let closed: Error = UpdateError::MonitorClosed.into();
        let mut unanswered = 0;
        while let Ok(request) = self.inbox.rx.try_recv() {
            if matches!(
                request,
                MonitorRequest::Write { .. } | MonitorRequest::Complete { .. }
            ) {
                unanswered += 1;
            }
            request.reject(&closed);
        }
        for (_, waiters) in self.pending.drain() {
            for reply in waiters {
                unanswered += 1;
                let _ = reply.send(Err(closed.clone()));
            }
        }

        self.emit(AppEvent::Activation(ActivationEvent::MonitorStopped {
            pending_requests: unanswered,
            installing: self.index.snapshot().installing.len(),
        }));
    }
}
