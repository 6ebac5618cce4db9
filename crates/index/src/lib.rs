#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Installation index for pkgup
//!
//! Tracks packages that are being installed and the blobs each of them is
//! still waiting on, and persists fully activated packages as
//! `<packages>/<name>/<version>` files whose content is the package merkle
//! root. The on-disk directory is the source of truth for "installed"; the
//! in-memory maps only hold what is not durable yet.

mod paths;

use paths::{package_version_path, validate_identity};
use pkgup_errors::{Error, StorageError};
use pkgup_types::Package;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Owned copy of the index bookkeeping at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    /// package merkle root -> package identity
    pub installing: BTreeMap<String, Package>,
    /// blob merkle root -> package merkle roots waiting on it
    pub needs: BTreeMap<String, BTreeSet<String>>,
    /// package merkle root -> blob merkle roots still outstanding
    pub waiting: BTreeMap<String, BTreeSet<String>>,
}

impl IndexSnapshot {
    /// True when `needs` and `waiting` are exact inverses and every waiting
    /// package is also installing.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let waiting_ok = self.waiting.iter().all(|(pkg, blobs)| {
            !blobs.is_empty()
                && self.installing.contains_key(pkg)
                && blobs
                    .iter()
                    .all(|blob| self.needs.get(blob).is_some_and(|p| p.contains(pkg)))
        });
        let needs_ok = self.needs.iter().all(|(blob, pkgs)| {
            !pkgs.is_empty()
                && pkgs
                    .iter()
                    .all(|pkg| self.waiting.get(pkg).is_some_and(|b| b.contains(blob)))
        });
        waiting_ok && needs_ok
    }
}

/// A package whose outstanding blob set became empty, with the outcome of
/// committing it to durable storage
#[derive(Debug, Clone)]
pub struct Activation {
    pub merkle: String,
    pub package: Package,
    pub result: Result<(), Error>,
}

/// Outcome of registering a package with `add_needs`
#[derive(Debug, Clone)]
pub enum Admission {
    /// Newly registered with a non-empty outstanding set
    Registered { outstanding: BTreeSet<String> },
    /// The merkle root was already installing; its current outstanding set
    AlreadyInstalling { outstanding: BTreeSet<String> },
    /// Nothing was outstanding, so the package was committed right away
    Activated(Activation),
}

/// Concurrency-safe index of installing and installed packages
pub struct DynamicIndex {
    root: PathBuf,
    // Guards all bookkeeping; operations are short and O(outstanding blobs).
    state: Mutex<IndexSnapshot>,
}

impl DynamicIndex {
    /// Initialize an index rooted at `root`.
    ///
    /// Failure to create the packages directory is logged and tolerated so a
    /// read-only or degraded data root does not take the process down; the
    /// error resurfaces from `add` for direct callers.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let index = Self {
            root,
            state: Mutex::new(IndexSnapshot::default()),
        };
        if let Err(e) = fs::create_dir_all(index.packages_dir()) {
            tracing::warn!(
                path = %index.packages_dir().display(),
                error = %e,
                "could not create packages directory"
            );
        }
        index
    }

    /// Directory holding `<name>/<version>` records
    #[must_use]
    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    /// Path of the record for `name`
    #[must_use]
    pub fn package_path(&self, name: &str) -> PathBuf {
        self.packages_dir().join(name.trim_start_matches('/'))
    }

    /// Path of the record for `name` at `version`
    #[must_use]
    pub fn package_version_path(&self, name: &str, version: &str) -> PathBuf {
        package_version_path(&self.packages_dir(), name, version)
    }

    fn lock(&self) -> MutexGuard<'_, IndexSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist `pkg` as installed under `merkle`.
    ///
    /// Callers must have ensured nothing is outstanding for `merkle`.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity cannot be mapped to a path or the
    /// record cannot be written.
    pub fn add(&self, pkg: &Package, merkle: &str) -> Result<(), Error> {
        validate_identity(pkg)?;
        let dir = self.package_path(&pkg.name);
        fs::create_dir_all(&dir).map_err(|e| StorageError::from_io_with_path(&e, &dir))?;

        let path = self.package_version_path(&pkg.name, &pkg.version);
        let tmp = dir.join(format!(".{}.tmp", pkg.version));
        fs::write(&tmp, merkle.as_bytes()).map_err(|e| StorageError::from_io_with_path(&e, &tmp))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::CommitFailed {
            merkle: merkle.to_string(),
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(())
    }

    /// All durably installed packages in byte-lexical order of (name, version).
    ///
    /// # Errors
    ///
    /// Returns an error if the packages directory cannot be read.
    pub fn list(&self) -> Result<Vec<Package>, Error> {
        let base = self.packages_dir();
        let mut pkgs = Vec::new();
        if base.is_dir() {
            collect_records(&base, &base, &mut pkgs)?;
        }
        pkgs.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        Ok(pkgs)
    }

    /// Register `pkg` as installing under `merkle` with the given outstanding blobs.
    ///
    /// An empty blob set means the package is complete: it is committed in the
    /// same critical section and reported as `Admission::Activated`.
    pub fn add_needs<I>(&self, merkle: &str, pkg: Package, blobs: I) -> Admission
    where
        I: IntoIterator<Item = String>,
    {
        let mut state = self.lock();
        if state.installing.contains_key(merkle) {
            let outstanding = state.waiting.get(merkle).cloned().unwrap_or_default();
            return Admission::AlreadyInstalling { outstanding };
        }

        let blobs: BTreeSet<String> = blobs.into_iter().collect();
        if blobs.is_empty() {
            let result = self.commit(&pkg, merkle);
            return Admission::Activated(Activation {
                merkle: merkle.to_string(),
                package: pkg,
                result,
            });
        }

        for blob in &blobs {
            state
                .needs
                .entry(blob.clone())
                .or_default()
                .insert(merkle.to_string());
        }
        state.installing.insert(merkle.to_string(), pkg);
        state.waiting.insert(merkle.to_string(), blobs.clone());
        Admission::Registered { outstanding: blobs }
    }

    /// Mark `blob` as available.
    ///
    /// Every package whose outstanding set becomes empty is committed and
    /// removed from the index. A blob nobody waits on is a no-op; spurious
    /// notifications are expected when packages share blobs.
    pub fn fulfill(&self, blob: &str) -> Vec<Activation> {
        let mut state = self.lock();
        let Some(package_roots) = state.needs.remove(blob) else {
            return Vec::new();
        };

        let mut activations = Vec::new();
        for root in package_roots {
            let done = match state.waiting.get_mut(&root) {
                Some(outstanding) => {
                    outstanding.remove(blob);
                    outstanding.is_empty()
                }
                None => false,
            };
            if !done {
                continue;
            }
            state.waiting.remove(&root);
            let Some(pkg) = state.installing.remove(&root) else {
                continue;
            };
            let result = self.commit(&pkg, &root);
            activations.push(Activation {
                merkle: root,
                package: pkg,
                result,
            });
        }
        activations
    }

    /// Write the package record with blocking `std::fs` calls while the
    /// caller holds the state lock. No reader sees a package leave
    /// `installing` before its record is on disk.
    fn commit(&self, pkg: &Package, merkle: &str) -> Result<(), Error> {
        let result = self.add(pkg, merkle);
        if let Err(e) = &result {
            tracing::warn!(package = %pkg, merkle, error = %e, "failed to commit package");
        }
        result
    }

    /// True if any package is still waiting on `blob`
    #[must_use]
    pub fn has_need(&self, blob: &str) -> bool {
        self.lock().needs.contains_key(blob)
    }

    /// Every blob with at least one outstanding waiter: the fetch backlog
    #[must_use]
    pub fn needs_list(&self) -> BTreeSet<String> {
        self.lock().needs.keys().cloned().collect()
    }

    /// Outstanding blobs for a package, if it is installing
    #[must_use]
    pub fn waiting_for(&self, merkle: &str) -> Option<BTreeSet<String>> {
        self.lock().waiting.get(merkle).cloned()
    }

    /// Package merkle roots currently waiting on `blob`
    #[must_use]
    pub fn waiters_of(&self, blob: &str) -> BTreeSet<String> {
        self.lock().needs.get(blob).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_installing(&self, merkle: &str) -> bool {
        self.lock().installing.contains_key(merkle)
    }

    /// Owned copy of the bookkeeping maps
    #[must_use]
    pub fn snapshot(&self) -> IndexSnapshot {
        self.lock().clone()
    }
}

// Versions are files and names are the directories above them, so nested
// names like /system/foo round-trip.
fn collect_records(base: &Path, dir: &Path, out: &mut Vec<Package>) -> Result<(), Error> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io_with_path(&e, dir))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io_with_path(&e, dir))?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }
        let file_type = entry
            .file_type()
            .map_err(|e| Error::io_with_path(&e, &path))?;
        if file_type.is_dir() {
            collect_records(base, &path, out)?;
            continue;
        }
        if dir == base {
            // a version file directly under packages/ has no name
            continue;
        }
        let Ok(rel) = dir.strip_prefix(base) else {
            continue;
        };
        let name = format!("/{}", rel.to_string_lossy());
        let merkle = fs::read_to_string(&path)
            .map_err(|e| Error::io_with_path(&e, &path))?
            .trim()
            .to_string();
        out.push(Package::new(name, file_name, merkle));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_writes_merkle_record() {
        let temp = tempdir().unwrap();
        let index = DynamicIndex::new(temp.path());
        let pkg = Package::new("/system/foo", "3", "");
        index.add(&pkg, "root-abc").unwrap();

        let path = temp.path().join("packages/system/foo/3");
        assert_eq!(fs::read_to_string(path).unwrap(), "root-abc");
    }

    #[test]
    fn test_add_rejects_traversal() {
        let temp = tempdir().unwrap();
        let index = DynamicIndex::new(temp.path());
        let err = index
            .add(&Package::new("/../escape", "1", ""), "root")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::InvalidPackage { .. })
        ));
    }

    #[test]
    fn test_already_installing_keeps_outstanding() {
        let temp = tempdir().unwrap();
        let index = DynamicIndex::new(temp.path());
        let pkg = Package::new("/a", "1", "");
        index.add_needs("root", pkg.clone(), ["b1".to_string(), "b2".to_string()]);
        index.fulfill("b1");

        match index.add_needs("root", pkg, ["b1".to_string(), "b2".to_string()]) {
            Admission::AlreadyInstalling { outstanding } => {
                assert_eq!(outstanding, BTreeSet::from(["b2".to_string()]));
            }
            other => panic!("unexpected admission {other:?}"),
        }
        assert!(index.snapshot().is_consistent());
    }

    #[test]
    fn test_hidden_files_skipped_in_list() {
        let temp = tempdir().unwrap();
        let index = DynamicIndex::new(temp.path());
        index.add(&Package::new("/a", "1", ""), "r").unwrap();
        fs::write(temp.path().join("packages/a/.2.tmp"), "partial").unwrap();
        fs::write(temp.path().join("packages/stray"), "x").unwrap();

        let listed = index.list().unwrap();
        assert_eq!(listed, vec![Package::new("/a", "1", "r")]);
    }
}
