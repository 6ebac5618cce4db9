//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields so
//! that the JSON log carries the same data the event channel did.

use pkgup_events::{ActivationEvent, AppEvent, EventMessage, GeneralEvent, UpdateEvent};
use tracing::{debug, error, info, warn};

/// Log an event at its own level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let event = &message.event;
    let meta = &message.meta;
    match event {
        AppEvent::Update(update_event) => match update_event {
            UpdateEvent::CheckStarted { requested, sources } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    requested = ?requested,
                    sources = sources,
                    "Update check started"
                );
            }
            UpdateEvent::UpdateAvailable {
                package,
                version,
                merkle,
                source_id,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    package = %package,
                    version = %version,
                    merkle = %merkle,
                    source_id = %source_id,
                    "Update available"
                );
            }
            UpdateEvent::NoUpdate { package } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    package = %package,
                    "No update"
                );
            }
            UpdateEvent::SourceFailed { source_id, failure } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    source_id = %source_id,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Source query failed"
                );
            }
            UpdateEvent::SourceRateLimited {
                source_id,
                check_limit,
                interval_secs,
            } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    source_id = %source_id,
                    check_limit = check_limit,
                    interval_secs = interval_secs,
                    "Source skipped, check limit reached"
                );
            }
            UpdateEvent::MetadataFetched {
                package,
                merkle,
                blobs,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    package = %package,
                    merkle = %merkle,
                    blobs = blobs,
                    "Package metadata fetched"
                );
            }
            UpdateEvent::MetadataFailed { package, failure } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    package = %package,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    "Package metadata fetch failed"
                );
            }
        },

        AppEvent::Activation(activation_event) => match activation_event {
            ActivationEvent::PackageAdmitted {
                package,
                merkle,
                outstanding,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    merkle = ?meta.merkle,
                    package = %package,
                    merkle = %merkle,
                    outstanding = outstanding,
                    "Package admitted"
                );
            }
            ActivationEvent::BlobRequested { blob } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    blob = %blob,
                    "Blob requested"
                );
            }
            ActivationEvent::BlobActivated { blob } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    blob = %blob,
                    "Blob activated"
                );
            }
            ActivationEvent::BlobFetchFailed { blob, failure } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    blob = %blob,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Blob fetch failed"
                );
            }
            ActivationEvent::PackageActivated {
                package,
                merkle,
                waiters,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    merkle = ?meta.merkle,
                    package = %package,
                    merkle = %merkle,
                    waiters = waiters,
                    "Package activated"
                );
            }
            ActivationEvent::CommitFailed {
                package,
                merkle,
                failure,
            } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    merkle = ?meta.merkle,
                    package = %package,
                    merkle = %merkle,
                    code = ?failure.code,
                    message = %failure.message,
                    "Package commit failed"
                );
            }
            ActivationEvent::MonitorStopped {
                pending_requests,
                installing,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    pending_requests = pending_requests,
                    installing = installing,
                    "Activation monitor stopped"
                );
            }
        },

        AppEvent::General(general_event) => match general_event {
            GeneralEvent::OperationStarted { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Operation started"
                );
            }
            GeneralEvent::OperationCompleted { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Operation completed"
                );
            }
            GeneralEvent::OperationFailed {
                operation,
                error: message,
            } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    message = %message,
                    "Operation failed"
                );
            }
            GeneralEvent::Warning { message } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    message = %message,
                    "Warning"
                );
            }
            GeneralEvent::DebugLog { message } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    message = %message,
                    "Debug log"
                );
            }
        },
    }
}
