//! System setup and initialization

use crate::error::CliError;
use pkgup_config::Config;
use pkgup_events::EventSender;
use pkgup_install::ActivationConfig;
use pkgup_ops::{ControlServer, SourceDefaults};
use pkgup_source::{DirSource, SourceConfig, SourceSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// System setup and component initialization
pub struct SystemSetup {
    config: Config,
    sources: SourceSet,
}

impl SystemSetup {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sources: SourceSet::new(),
        }
    }

    /// Create directories and register the configured sources
    pub async fn initialize(&mut self) -> Result<(), CliError> {
        info!("Initializing pkgup components");
        self.ensure_data_directories().await?;
        self.init_sources().await;
        info!("System initialization completed");
        Ok(())
    }

    async fn ensure_data_directories(&self) -> Result<(), CliError> {
        let required = [
            self.config.root(),
            self.config.packages_path(),
            self.config.blobs_path(),
            self.config.meta_path(),
            self.config.sources_path(),
        ];
        for dir in &required {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|source| CliError::DataDir {
                        path: dir.clone(),
                        source,
                    })?;
            }
        }
        Ok(())
    }

    /// Sources from the config file take priority over ones added at runtime
    async fn init_sources(&mut self) {
        let defaults = &self.config.sources;
        for entry in &defaults.directories {
            let config = SourceConfig::new(&entry.id, entry.path.display().to_string())
                .with_limits(
                    entry.check_interval.unwrap_or(defaults.check_interval),
                    entry.check_limit.unwrap_or(defaults.check_limit),
                );
            match DirSource::new(config) {
                Ok(source) => {
                    if !self.sources.add(Arc::new(source)).await {
                        warn!("Duplicate source id in config: {}", entry.id);
                    }
                }
                Err(e) => warn!("Skipping configured source {}: {e}", entry.id),
            }
        }
    }

    /// Build the control server; nothing runs until `start`
    pub fn control_server(&self, event_sender: EventSender) -> Result<ControlServer, CliError> {
        let server = ControlServer::builder()
            .with_root(self.config.root())
            .with_sources(self.sources.clone())
            .with_source_defaults(SourceDefaults {
                check_interval: self.config.sources.check_interval,
                check_limit: self.config.sources.check_limit,
            })
            .with_activation_config(ActivationConfig {
                queue_capacity: self.config.monitor.queue_capacity,
                fetch_concurrency: self.config.monitor.fetch_concurrency,
            })
            .with_event_sender(event_sender)
            .build()?;
        Ok(server)
    }
}
