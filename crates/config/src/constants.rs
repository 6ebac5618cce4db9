//! Centralized, non-configurable filesystem paths for pkgup
//!
//! The data root can be moved through configuration; everything else is
//! laid out relative to it with these fixed names.

pub const DEFAULT_ROOT: &str = "/var/lib/pkgup";
pub const LOGS_DIR: &str = "/var/log/pkgup";

pub const PACKAGES_DIR: &str = "packages";
pub const BLOBS_DIR: &str = "blobs";
pub const META_DIR: &str = "meta";
pub const SOURCES_DIR: &str = "sources";
