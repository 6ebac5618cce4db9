#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the pkgup update daemon
//!
//! This crate provides the package identity tuple and the update records
//! that move between the resolver, the fetch stage and the activation monitor.

pub mod package;
pub mod update;

// Re-export commonly used types
pub use package::Package;
pub use update::{PackageMeta, UpdateRecord};
