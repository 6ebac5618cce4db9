//! Update requests: synchronous admission, completion handles and the
//! store's activation notifications

use crate::ControlServer;
use pkgup_errors::{Error, SourceError, UpdateError};
use pkgup_events::EventEmitter;
use pkgup_install::UpdatePipeline;
use pkgup_types::Package;
use tokio::sync::oneshot;

/// Answer to `get_update_complete`
///
/// Resolves with the package merkle root once every blob is present, or with
/// the failure that stopped the update. Dropping it abandons the request.
#[derive(Debug)]
pub struct UpdateHandle {
    package: String,
    rx: oneshot::Receiver<Result<String, Error>>,
}

impl UpdateHandle {
    /// Name of the requested package
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Wait for the update to be fully activated.
    ///
    /// # Errors
    ///
    /// Returns the resolution, fetch or activation failure, or
    /// `UpdateError::MonitorClosed` if the server quit first.
    pub async fn wait(self) -> Result<String, Error> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(UpdateError::MonitorClosed.into()))
    }
}

impl ControlServer {
    /// Resolve `name`, fetch its metadata and admit it to the store.
    ///
    /// Returns the resolved merkle root once admission completes; blob
    /// content keeps arriving in the background.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::NoPackageName` for an empty name,
    /// `UpdateError::NoUpdateAvailable` when no source has anything newer,
    /// `UpdateError::CheckFailed` when a source could not be asked, or the
    /// store's admission failure.
    pub async fn get_update(
        &self,
        name: &str,
        version: Option<&str>,
        merkle: Option<&str>,
    ) -> Result<String, Error> {
        let pkg = Package::request(name, version, merkle)?;
        let running = self.running()?;
        running
            .pipeline
            .fetch_and_admit(&pkg)
            .await
            .map_err(|e| update_failure(&pkg, e))
    }

    /// Start an update and return at once; the handle resolves at full
    /// activation.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::NoPackageName` for an empty name and
    /// `UpdateError::NotStarted` before `start`. Everything else is reported
    /// through the handle.
    pub fn get_update_complete(
        &self,
        name: &str,
        version: Option<&str>,
        merkle: Option<&str>,
    ) -> Result<UpdateHandle, Error> {
        let pkg = Package::request(name, version, merkle)?;
        let pipeline = self.running()?.pipeline.clone();
        let (mut reply, rx) = oneshot::channel();
        let handle = UpdateHandle {
            package: pkg.name.clone(),
            rx,
        };

        tokio::spawn(async move {
            let outcome = tokio::select! {
                () = reply.closed() => {
                    tracing::debug!(package = %pkg, "update abandoned by caller");
                    return;
                }
                outcome = complete_update(&pipeline, &pkg) => outcome,
            };
            let _ = reply.send(outcome.map_err(|e| update_failure(&pkg, e)));
        });

        Ok(handle)
    }

    /// The store reports that content for `blobs` is now present.
    ///
    /// Forwarded one at a time to the activation monitor. Unknown blobs are
    /// ignored there.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::NotStarted` before `start` and
    /// `UpdateError::MonitorClosed` after `quit`.
    pub async fn packages_activated(&self, blobs: Vec<String>) -> Result<(), Error> {
        let running = self.running()?;
        let count = blobs.len();
        for blob in blobs {
            running.monitor.fulfill(blob).await?;
        }
        self.emit_debug(format!("forwarded {count} activated blobs"));
        Ok(())
    }
}

async fn complete_update(pipeline: &UpdatePipeline, pkg: &Package) -> Result<String, Error> {
    let record = pipeline.fetch_only(pkg).await?;
    let completion = pipeline.complete(record).await?;
    completion.wait().await
}

/// Turn resolver failures into the caller-facing update errors
fn update_failure(pkg: &Package, error: Error) -> Error {
    match error {
        Error::Source(SourceError::NoUpdate { .. }) => UpdateError::NoUpdateAvailable {
            package: pkg.name.clone(),
        }
        .into(),
        Error::Source(e) => UpdateError::CheckFailed {
            package: pkg.name.clone(),
            message: e.to_string(),
        }
        .into(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_update_becomes_update_error() {
        let pkg = Package::new("/x", "", "");
        let err = update_failure(
            &pkg,
            SourceError::NoUpdate {
                package: "/x".into(),
            }
            .into(),
        );
        assert!(matches!(
            err,
            Error::Update(UpdateError::NoUpdateAvailable { ref package }) if package == "/x"
        ));
    }

    #[test]
    fn test_source_failure_becomes_check_failed() {
        let pkg = Package::new("/x", "", "");
        let err = update_failure(
            &pkg,
            SourceError::RateLimited {
                source_id: "s".into(),
            }
            .into(),
        );
        assert!(matches!(err, Error::Update(UpdateError::CheckFailed { .. })));
    }

    #[test]
    fn test_other_failures_pass_through() {
        let pkg = Package::new("/x", "", "");
        let err = update_failure(&pkg, UpdateError::MonitorClosed.into());
        assert!(matches!(err, Error::Update(UpdateError::MonitorClosed)));
    }
}
