use pkgup_errors::{Error, StorageError};
use pkgup_types::Package;
use std::path::{Component, Path, PathBuf};

pub(crate) fn package_version_path(base: &Path, name: &str, version: &str) -> PathBuf {
    base.join(name.trim_start_matches('/')).join(version)
}

/// Reject identities that cannot be stored as `<name>/<version>` beneath the
/// packages directory.
pub(crate) fn validate_identity(pkg: &Package) -> Result<(), Error> {
    let invalid = |reason: &str| -> Error {
        StorageError::InvalidPackage {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            reason: reason.to_string(),
        }
        .into()
    };

    let name = pkg.name.trim_start_matches('/');
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if pkg.version.is_empty() {
        return Err(invalid("empty version"));
    }
    if pkg.version.contains('/') || pkg.version.starts_with('.') {
        return Err(invalid("version is not a plain file name"));
    }
    let normal = Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !normal || name.split('/').any(|seg| seg.is_empty() || seg.starts_with('.')) {
        return Err(invalid("name must be plain path segments"));
    }
    Ok(())
}
