#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Control surface for pkgup
//!
//! [`ControlServer`] is the request-handling facade: it owns the source
//! registry, the installation index and, once started, the activation
//! monitor, and turns caller requests into resolver and pipeline work.

mod query;
mod repository;
mod server;
mod update;

pub use server::{ControlServer, ControlServerBuilder, SourceDefaults};
pub use update::UpdateHandle;
