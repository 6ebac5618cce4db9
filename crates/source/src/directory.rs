//! Directory-backed source
//!
//! Layout under the source directory:
//!
//! ```text
//! targets/<name>/<version>   file containing the package merkle root
//! meta/<merkle>.json         PackageMeta
//! blobs/<merkle>             blob content
//! ```

use crate::{Source, SourceConfig};
use async_trait::async_trait;
use pkgup_errors::{Error, SourceError};
use pkgup_types::{Package, PackageMeta};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct DirSource {
    config: SourceConfig,
    dir: PathBuf,
}

impl DirSource {
    /// Build a source from its config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config URL does not name a local directory.
    pub fn new(config: SourceConfig) -> Result<Self, Error> {
        let dir = config.location()?;
        Ok(Self { config, dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn targets_dir(&self, name: &str) -> Option<PathBuf> {
        let rel = name.trim_start_matches('/');
        if rel.is_empty() || !is_plain(Path::new(rel)) {
            return None;
        }
        Some(self.dir.join("targets").join(rel))
    }

    fn query_failed(&self, err: &std::io::Error, path: &Path) -> Error {
        SourceError::QueryFailed {
            source_id: self.config.id.clone(),
            message: format!("{}: {err}", path.display()),
        }
        .into()
    }

    /// (version, merkle) this source offers for `pkg`, honoring a pinned version
    async fn offered(&self, pkg: &Package) -> Result<Option<(String, String)>, Error> {
        let Some(dir) = self.targets_dir(&pkg.name) else {
            return Ok(None);
        };

        let version = if pkg.has_version() {
            if !is_plain(Path::new(&pkg.version)) {
                return Ok(None);
            }
            pkg.version.clone()
        } else {
            match latest_version(&dir).await {
                Ok(Some(v)) => v,
                Ok(None) => return Ok(None),
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(self.query_failed(&e, &dir)),
            }
        };

        let path = dir.join(&version);
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let merkle = content.trim().to_string();
                if merkle.is_empty() {
                    return Err(SourceError::MalformedMetadata {
                        merkle: String::new(),
                        message: format!("empty target record {}", path.display()),
                    }
                    .into());
                }
                Ok(Some((version, merkle)))
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(None)
            }
            Err(e) => Err(self.query_failed(&e, &path)),
        }
    }

    fn content_path(&self, kind: &str, merkle: &str, suffix: &str) -> Result<PathBuf, Error> {
        if merkle.is_empty() || !is_plain(Path::new(merkle)) || merkle.contains('/') {
            return Err(SourceError::NoUpdateContent {
                merkle: merkle.to_string(),
            }
            .into());
        }
        Ok(self.dir.join(kind).join(format!("{merkle}{suffix}")))
    }
}

#[async_trait]
impl Source for DirSource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn available_updates(
        &self,
        requested: &[Package],
    ) -> Result<HashMap<Package, Package>, Error> {
        let mut updates = HashMap::new();
        for pkg in requested {
            let Some((version, merkle)) = self.offered(pkg).await? else {
                continue;
            };
            if pkg.has_merkle() && pkg.merkle == merkle {
                continue;
            }
            updates.insert(pkg.clone(), Package::new(&pkg.name, version, merkle));
        }
        Ok(updates)
    }

    async fn fetch_metadata(&self, pkg: &Package) -> Result<PackageMeta, Error> {
        let path = self.content_path("meta", &pkg.merkle, ".json")?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::NoUpdateContent {
                    merkle: pkg.merkle.clone(),
                }
                .into())
            }
            Err(e) => return Err(self.query_failed(&e, &path)),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            SourceError::MalformedMetadata {
                merkle: pkg.merkle.clone(),
                message: e.to_string(),
            }
            .into()
        })
    }

    async fn fetch_blob(&self, merkle: &str) -> Result<Vec<u8>, Error> {
        let path = self.content_path("blobs", merkle, "")?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SourceError::NoUpdateContent {
                merkle: merkle.to_string(),
            }
            .into()),
            Err(e) => Err(self.query_failed(&e, &path)),
        }
    }
}

fn is_plain(path: &Path) -> bool {
    path.components().all(|c| match c {
        Component::Normal(seg) => !seg.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Byte-lexically last version file in `dir`
async fn latest_version(dir: &Path) -> std::io::Result<Option<String>> {
    let mut rd = fs::read_dir(dir).await?;
    let mut latest: Option<String> = None;
    while let Some(entry) = rd.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if latest.as_ref().is_none_or(|cur| name.as_bytes() > cur.as_bytes()) {
            latest = Some(name);
        }
    }
    Ok(latest)
}
