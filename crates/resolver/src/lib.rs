#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Update resolution for pkgup
//!
//! Turns requested packages (name, optional version, optional merkle root)
//! into update records by asking every registered source, then fetches the
//! blob manifest of a chosen update. No cross-source ranking is done: the
//! first source, in registration order, that reports an update wins.

mod fetch;
mod resolver;

pub use resolver::UpdateResolver;

use pkgup_errors::Error;
use pkgup_types::{Package, UpdateRecord};
use std::collections::HashMap;

/// Per-package outcome of one resolution pass
pub type Resolution = HashMap<Package, Result<UpdateRecord, Error>>;
