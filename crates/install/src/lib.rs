#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package activation for pkgup
//!
//! A fetched update is admitted to the store, its missing blobs are fetched,
//! and the package is committed to the installation index once the last
//! blob is present. All of that bookkeeping is serialized through the
//! [`ActivationMonitor`]; everything else talks to it through a
//! [`MonitorHandle`].

mod handle;
mod monitor;
mod pipeline;
mod request;
mod resource;

pub use handle::{Completion, MonitorHandle, MonitorInbox};
pub use monitor::{ActivationConfig, ActivationMonitor};
pub use pipeline::UpdatePipeline;
pub use request::{MonitorRequest, Reply};
pub use resource::{acquire_semaphore_permit, create_semaphore};
