//! Package identity types

use pkgup_errors::UpdateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a package as requested by a client or reported by a source.
///
/// `version` and `merkle` are opaque source-defined strings. An empty
/// `version` means "latest" and an empty `merkle` means "not yet known".
/// Equality is over the full tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub merkle: String,
}

impl Package {
    /// Create a new package identity
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        merkle: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            merkle: merkle.into(),
        }
    }

    /// Build a package request from caller input, normalizing the name to be
    /// slash-rooted and treating missing version/merkle as blank.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::NoPackageName` when `name` is empty.
    pub fn request(
        name: &str,
        version: Option<&str>,
        merkle: Option<&str>,
    ) -> Result<Self, UpdateError> {
        if name.is_empty() {
            return Err(UpdateError::NoPackageName);
        }
        let name = if name.starts_with('/') {
            name.to_string()
        } else {
            format!("/{name}")
        };
        Ok(Self {
            name,
            version: version.unwrap_or_default().to_string(),
            merkle: merkle.unwrap_or_default().to_string(),
        })
    }

    /// True when the request pins a concrete version
    #[must_use]
    pub fn has_version(&self) -> bool {
        !self.version.is_empty()
    }

    /// True when the content digest is known
    #[must_use]
    pub fn has_merkle(&self) -> bool {
        !self.merkle.is_empty()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.version.is_empty() {
            write!(f, "/{}", self.version)?;
        }
        if !self.merkle.is_empty() {
            write!(f, "@{}", self.merkle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_normalizes_name() {
        let pkg = Package::request("system/foo", None, None).unwrap();
        assert_eq!(pkg.name, "/system/foo");
        assert!(!pkg.has_version());
        assert!(!pkg.has_merkle());

        let pkg = Package::request("/bar", Some("2"), Some("abc")).unwrap();
        assert_eq!(pkg, Package::new("/bar", "2", "abc"));
    }

    #[test]
    fn test_request_rejects_empty_name() {
        assert!(matches!(
            Package::request("", Some("1"), None),
            Err(UpdateError::NoPackageName)
        ));
    }

    #[test]
    fn test_package_display() {
        assert_eq!(Package::new("/a", "", "").to_string(), "/a");
        assert_eq!(Package::new("/a", "1", "").to_string(), "/a/1");
        assert_eq!(Package::new("/a", "1", "ff").to_string(), "/a/1@ff");
    }
}
