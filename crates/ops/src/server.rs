//! Control server wiring and lifecycle

use pkgup_errors::{ConfigError, Error, UpdateError};
use pkgup_events::{EventEmitter, EventSender};
use pkgup_index::DynamicIndex;
use pkgup_install::{ActivationConfig, ActivationMonitor, MonitorHandle, UpdatePipeline};
use pkgup_resolver::UpdateResolver;
use pkgup_source::{SourceSet, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_CHECK_LIMIT};
use pkgup_store::FsBlobStore;
use pkgup_types::{Package, UpdateRecord};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;

/// Source id recorded on updates re-admitted from the store at start
const RESUMED_SOURCE: &str = "store";

/// Limits applied to sources registered through `add_src`
#[derive(Debug, Clone, Copy)]
pub struct SourceDefaults {
    pub check_interval: u64,
    pub check_limit: u64,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            check_limit: DEFAULT_CHECK_LIMIT,
        }
    }
}

/// Components that exist once `start` has run
pub(crate) struct Running {
    pub(crate) pipeline: UpdatePipeline,
    pub(crate) monitor: MonitorHandle,
    pub(crate) store: Arc<FsBlobStore>,
    join: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct Inner {
    pub(crate) root: PathBuf,
    pub(crate) index: Arc<DynamicIndex>,
    pub(crate) sources: SourceSet,
    pub(crate) source_defaults: SourceDefaults,
    activation: ActivationConfig,
    pub(crate) tx: Option<EventSender>,
    running: OnceCell<Running>,
}

/// Request-handling surface of the update daemon
///
/// Cheap to clone; clones share state, so each caller session can hold its
/// own.
#[derive(Clone)]
pub struct ControlServer {
    pub(crate) inner: Arc<Inner>,
}

impl EventEmitter for ControlServer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.inner.tx.as_ref()
    }
}

impl ControlServer {
    #[must_use]
    pub fn builder() -> ControlServerBuilder {
        ControlServerBuilder::new()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    #[must_use]
    pub fn index(&self) -> &Arc<DynamicIndex> {
        &self.inner.index
    }

    #[must_use]
    pub fn sources(&self) -> &SourceSet {
        &self.inner.sources
    }

    pub(crate) fn sources_dir(&self) -> PathBuf {
        self.inner.root.join("sources")
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.running.initialized()
    }

    /// Spawn the activation monitor, load persisted sources and resume
    /// admitted updates that had not activated when the server last quit.
    ///
    /// Safe to call any number of times from any number of tasks; the work
    /// happens exactly once.
    ///
    /// # Errors
    ///
    /// Currently infallible once constructed; persisted sources or admitted
    /// updates that cannot be loaded are reported as warnings.
    pub async fn start(&self) -> Result<(), Error> {
        self.inner
            .running
            .get_or_try_init(|| self.boot())
            .await
            .map(|_| ())
    }

    async fn boot(&self) -> Result<Running, Error> {
        let inner = &self.inner;
        let (monitor, inbox) = MonitorHandle::channel(inner.activation.queue_capacity);
        let store = Arc::new(
            FsBlobStore::new(&inner.root, inner.sources.clone())
                .with_sink(Arc::new(monitor.clone())),
        );

        let mut activation = ActivationMonitor::new(
            inner.index.clone(),
            store.clone(),
            monitor.clone(),
            inbox,
            &inner.activation,
        );
        let mut resolver = UpdateResolver::new(inner.sources.clone());
        let mut pipeline_tx = None;
        if let Some(tx) = &inner.tx {
            activation = activation.with_event_sender(tx.clone());
            resolver = resolver.with_event_sender(tx.clone());
            pipeline_tx = Some(tx.clone());
        }
        let join = activation.spawn();

        match inner.sources.load(&self.sources_dir()).await {
            Ok(0) => {}
            Ok(n) => self.emit_debug(format!("loaded {n} persisted sources")),
            Err(e) => self.emit_warning(format!("could not load persisted sources: {e}")),
        }
        self.resume_admitted(&store, &monitor).await;

        let mut pipeline = UpdatePipeline::new(resolver, monitor.clone());
        if let Some(tx) = pipeline_tx {
            pipeline = pipeline.with_event_sender(tx);
        }

        tracing::debug!(root = %inner.root.display(), "control server started");
        Ok(Running {
            pipeline,
            monitor,
            store,
            join: Mutex::new(Some(join)),
        })
    }

    /// Hand every admitted update that never committed back to the monitor.
    ///
    /// Admission is durable before any blob is fetched, so a record under
    /// `meta/` with no matching package record is an activation that was cut
    /// short by a previous shutdown.
    async fn resume_admitted(&self, store: &FsBlobStore, monitor: &MonitorHandle) {
        let admitted = match store.admitted().await {
            Ok(admitted) => admitted,
            Err(e) => {
                self.emit_warning(format!("could not scan admitted updates: {e}"));
                return;
            }
        };
        if admitted.is_empty() {
            return;
        }
        let installed: HashSet<Package> = match self.inner.index.list() {
            Ok(packages) => packages.into_iter().collect(),
            Err(e) => {
                self.emit_warning(format!("could not read installed packages: {e}"));
                return;
            }
        };

        let mut resumed = 0;
        for (merkle, meta) in admitted {
            let update = Package::new(&meta.name, &meta.version, &merkle);
            if installed.contains(&update) {
                continue;
            }
            let orig = Package::new(&meta.name, "", "");
            let record = UpdateRecord::new(orig, update, RESUMED_SOURCE).with_meta(&meta);
            match monitor.write(record).await {
                Ok(_) => resumed += 1,
                Err(e) => self.emit_warning(format!("could not resume {merkle}: {e}")),
            }
        }
        if resumed > 0 {
            self.emit_debug(format!("resumed {resumed} admitted updates"));
        }
    }

    pub(crate) fn running(&self) -> Result<&Running, Error> {
        self.inner
            .running
            .get()
            .ok_or_else(|| UpdateError::NotStarted.into())
    }

    /// Stop accepting work. Every queued or pending request is answered with
    /// `UpdateError::MonitorClosed`; waits for the monitor to finish.
    pub async fn quit(&self) {
        let Some(running) = self.inner.running.get() else {
            return;
        };
        running.monitor.shutdown();
        let join = running.join.lock().await.take();
        if let Some(join) = join {
            if let Err(e) = join.await {
                self.emit_warning(format!("activation monitor ended abnormally: {e}"));
            }
        }
    }
}

/// Builder for [`ControlServer`]
#[derive(Default)]
pub struct ControlServerBuilder {
    root: Option<PathBuf>,
    sources: Option<SourceSet>,
    source_defaults: SourceDefaults,
    activation: ActivationConfig,
    tx: Option<EventSender>,
}

impl ControlServerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Data root holding packages, blobs, meta and sources
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Pre-populated source registry (e.g. from the config file)
    #[must_use]
    pub fn with_sources(mut self, sources: SourceSet) -> Self {
        self.sources = Some(sources);
        self
    }

    #[must_use]
    pub fn with_source_defaults(mut self, defaults: SourceDefaults) -> Self {
        self.source_defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_activation_config(mut self, config: ActivationConfig) -> Self {
        self.activation = config;
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Build the server. Nothing runs until `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if no data root was given.
    pub fn build(self) -> Result<ControlServer, Error> {
        let root = self.root.ok_or_else(|| ConfigError::MissingField {
            field: "root".to_string(),
        })?;
        let index = Arc::new(DynamicIndex::new(&root));
        Ok(ControlServer {
            inner: Arc::new(Inner {
                root,
                index,
                sources: self.sources.unwrap_or_default(),
                source_defaults: self.source_defaults,
                activation: self.activation,
                tx: self.tx,
                running: OnceCell::new(),
            }),
        })
    }
}
