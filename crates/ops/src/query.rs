//! Read-side requests: installed packages, update checks and blob fetches

use crate::ControlServer;
use pkgup_errors::{Error, UpdateError};
use pkgup_store::PackageStore;
use pkgup_types::Package;
use std::collections::BTreeMap;

impl ControlServer {
    /// Packages committed to the installation index, sorted by name and
    /// version
    ///
    /// # Errors
    ///
    /// Returns an error if the packages directory cannot be read.
    pub fn list(&self) -> Result<Vec<Package>, Error> {
        self.inner.index.list()
    }

    /// Ask the sources whether anything installed has an update.
    ///
    /// Each installed name is checked once, against its newest listed
    /// version's merkle root, so an up-to-date package reports no update.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::NotStarted` before `start`, or the index read
    /// failure.
    pub async fn check(&self) -> Result<bool, Error> {
        let running = self.running()?;

        // list() is sorted, so the last entry per name is the newest.
        let mut installed: BTreeMap<String, Package> = BTreeMap::new();
        for pkg in self.list()? {
            installed.insert(
                pkg.name.clone(),
                Package::new(pkg.name, "", pkg.merkle),
            );
        }
        if installed.is_empty() {
            return Ok(false);
        }

        let requested: Vec<Package> = installed.into_values().collect();
        let resolution = running.pipeline.resolver().resolve(&requested).await;
        Ok(resolution.values().any(Result::is_ok))
    }

    /// Fetch a blob into the local store.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::EmptyMerkle` for a blank merkle, or the fetch
    /// failure.
    pub async fn get_blob(&self, merkle: &str) -> Result<(), Error> {
        let merkle = merkle.trim();
        if merkle.is_empty() {
            return Err(UpdateError::EmptyMerkle.into());
        }
        let running = self.running()?;
        running.store.fetch_blob(merkle).await
    }
}
