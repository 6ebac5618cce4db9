//! Fetch pipeline: resolution and metadata, then hand-off to the monitor

use crate::handle::{Completion, MonitorHandle};
use pkgup_errors::Error;
use pkgup_events::{EventEmitter, EventSender};
use pkgup_resolver::UpdateResolver;
use pkgup_types::{Package, UpdateRecord};

#[derive(Clone)]
pub struct UpdatePipeline {
    resolver: UpdateResolver,
    monitor: MonitorHandle,
    tx: Option<EventSender>,
}

impl EventEmitter for UpdatePipeline {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl UpdatePipeline {
    #[must_use]
    pub fn new(resolver: UpdateResolver, monitor: MonitorHandle) -> Self {
        Self {
            resolver,
            monitor,
            tx: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &UpdateResolver {
        &self.resolver
    }

    #[must_use]
    pub fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    /// Resolve `pkg` and fetch its metadata without touching the store
    ///
    /// # Errors
    ///
    /// Returns "no update" or the source failure.
    pub async fn fetch_only(&self, pkg: &Package) -> Result<UpdateRecord, Error> {
        self.resolver.fetch_update(pkg).await
    }

    /// Resolve, fetch metadata, and admit through exactly one write request.
    ///
    /// Returns the resolved merkle root once the store admission completes;
    /// blob content may still be arriving.
    ///
    /// # Errors
    ///
    /// Returns the resolution, metadata or admission failure.
    pub async fn fetch_and_admit(&self, pkg: &Package) -> Result<String, Error> {
        let operation = format!("update {}", pkg.name);
        self.emit_operation_started(&operation);
        let result = match self.fetch_only(pkg).await {
            Ok(record) => self.monitor.write(record).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(_) => self.emit_operation_completed(&operation),
            Err(e) => self.emit_operation_failed(&operation, e.to_string()),
        }
        result
    }

    /// Queue a completion request for an already fetched update
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::MonitorClosed` if the monitor is gone.
    pub async fn complete(&self, record: UpdateRecord) -> Result<Completion, Error> {
        self.monitor.complete(record).await
    }
}
