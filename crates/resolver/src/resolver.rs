//! Source querying and first-match selection

use crate::Resolution;
use futures::future::join_all;
use pkgup_errors::{Error, SourceError};
use pkgup_events::{AppEvent, EventEmitter, EventSender, FailureContext, UpdateEvent};
use pkgup_source::{RegisteredSource, SourceSet};
use pkgup_types::{Package, UpdateRecord};
use std::collections::HashMap;

/// Resolves requested packages against the registered sources
#[derive(Clone)]
pub struct UpdateResolver {
    sources: SourceSet,
    tx: Option<EventSender>,
}

impl EventEmitter for UpdateResolver {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl UpdateResolver {
    #[must_use]
    pub fn new(sources: SourceSet) -> Self {
        Self { sources, tx: None }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Resolve a batch of packages.
    ///
    /// Every requested package gets an entry. A package no source reports is
    /// `SourceError::NoUpdate`, unless a source failed or was skipped during
    /// the pass, in which case the first such failure is returned instead so
    /// the caller can tell "nothing newer" from "could not ask".
    pub async fn resolve(&self, requested: &[Package]) -> Resolution {
        let sources = self.sources.snapshot().await;
        self.emit(AppEvent::Update(UpdateEvent::CheckStarted {
            requested: requested.iter().map(ToString::to_string).collect(),
            sources: sources.len(),
        }));

        let mut first_failure: Option<Error> = None;
        let mut admitted: Vec<&RegisteredSource> = Vec::with_capacity(sources.len());
        for registered in &sources {
            if registered.try_check() {
                admitted.push(registered);
                continue;
            }
            let source = registered.source();
            self.emit(AppEvent::Update(UpdateEvent::SourceRateLimited {
                source_id: registered.id().to_string(),
                check_limit: source.check_limit(),
                interval_secs: source.check_interval().as_secs(),
            }));
            first_failure.get_or_insert_with(|| {
                SourceError::RateLimited {
                    source_id: registered.id().to_string(),
                }
                .into()
            });
        }

        // Query concurrently; join_all keeps registration order for the tie-break.
        let responses = join_all(
            admitted
                .iter()
                .map(|registered| registered.source().available_updates(requested)),
        )
        .await;

        let mut found: HashMap<Package, UpdateRecord> = HashMap::new();
        for (registered, response) in admitted.iter().zip(responses) {
            let updates = match response {
                Ok(updates) => updates,
                Err(e) => {
                    self.emit(AppEvent::Update(UpdateEvent::SourceFailed {
                        source_id: registered.id().to_string(),
                        failure: FailureContext::from_error(&e),
                    }));
                    first_failure.get_or_insert(e);
                    continue;
                }
            };
            for (orig, update) in updates {
                if found.contains_key(&orig) || !requested.contains(&orig) {
                    continue;
                }
                self.emit(AppEvent::Update(UpdateEvent::UpdateAvailable {
                    package: orig.name.clone(),
                    version: update.version.clone(),
                    merkle: update.merkle.clone(),
                    source_id: registered.id().to_string(),
                }));
                found.insert(
                    orig.clone(),
                    UpdateRecord::new(orig, update, registered.id()),
                );
            }
        }

        let mut resolution = Resolution::with_capacity(requested.len());
        for pkg in requested {
            let outcome = match found.remove(pkg) {
                Some(record) => Ok(record),
                None => {
                    self.emit(AppEvent::Update(UpdateEvent::NoUpdate {
                        package: pkg.name.clone(),
                    }));
                    Err(first_failure.clone().unwrap_or_else(|| {
                        SourceError::NoUpdate {
                            package: pkg.name.clone(),
                        }
                        .into()
                    }))
                }
            };
            resolution.insert(pkg.clone(), outcome);
        }
        resolution
    }

    /// Resolve a single package
    ///
    /// # Errors
    ///
    /// Returns `SourceError::NoUpdate` if no source has an update, or the
    /// failure of a source that could not be queried.
    pub async fn resolve_one(&self, pkg: &Package) -> Result<UpdateRecord, Error> {
        let mut resolution = self.resolve(std::slice::from_ref(pkg)).await;
        resolution.remove(pkg).unwrap_or_else(|| {
            Err(SourceError::NoUpdate {
                package: pkg.name.clone(),
            }
            .into())
        })
    }
}
