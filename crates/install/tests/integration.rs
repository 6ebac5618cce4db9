//! Integration tests for install crate

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pkgup_errors::{Error, SourceError, StorageError, UpdateError};
    use pkgup_events::{channel, ActivationEvent, AppEvent, EventReceiver};
    use pkgup_index::DynamicIndex;
    use pkgup_install::*;
    use pkgup_source::{DirSource, SourceConfig, SourceSet};
    use pkgup_store::{FsBlobStore, PackageStore};
    use pkgup_types::{Package, UpdateRecord};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::task::JoinHandle;

    /// Store whose fetches succeed silently; content "arrives" when the test
    /// calls `fulfill` on the handle.
    #[derive(Default)]
    struct FakeStore {
        present: Mutex<HashSet<String>>,
        broken: Mutex<HashSet<String>>,
        fetched: Mutex<Vec<String>>,
        admitted: Mutex<Vec<String>>,
        reject_admission: bool,
    }

    impl FakeStore {
        fn with_present(blobs: &[&str]) -> Self {
            let store = Self::default();
            store
                .present
                .lock()
                .unwrap()
                .extend(blobs.iter().map(|b| (*b).to_string()));
            store
        }

        fn with_broken(blobs: &[&str]) -> Self {
            let store = Self::default();
            store
                .broken
                .lock()
                .unwrap()
                .extend(blobs.iter().map(|b| (*b).to_string()));
            store
        }
    }

    #[async_trait]
    impl PackageStore for FakeStore {
        async fn has_blob(&self, merkle: &str) -> bool {
            self.present.lock().unwrap().contains(merkle)
        }

        async fn fetch_blob(&self, merkle: &str) -> Result<(), Error> {
            self.fetched.lock().unwrap().push(merkle.to_string());
            if self.broken.lock().unwrap().contains(merkle) {
                return Err(SourceError::NoUpdateContent {
                    merkle: merkle.to_string(),
                }
                .into());
            }
            Ok(())
        }

        async fn admit(&self, record: &UpdateRecord) -> Result<(), Error> {
            if self.reject_admission {
                return Err(StorageError::IoError {
                    message: "disk full".into(),
                }
                .into());
            }
            self.admitted
                .lock()
                .unwrap()
                .push(record.merkle().to_string());
            Ok(())
        }
    }

    struct Harness {
        _temp: TempDir,
        index: Arc<DynamicIndex>,
        store: Arc<FakeStore>,
        handle: MonitorHandle,
        join: JoinHandle<()>,
        events: EventReceiver,
    }

    fn start(store: FakeStore) -> Harness {
        let temp = TempDir::new().unwrap();
        let index = Arc::new(DynamicIndex::new(temp.path()));
        let store = Arc::new(store);
        let (handle, inbox) = MonitorHandle::channel(5);
        let (tx, events) = channel();
        let monitor = ActivationMonitor::new(
            index.clone(),
            store.clone(),
            handle.clone(),
            inbox,
            &ActivationConfig::default(),
        )
        .with_event_sender(tx);
        let join = monitor.spawn();
        Harness {
            _temp: temp,
            index,
            store,
            handle,
            join,
            events,
        }
    }

    fn record(name: &str, merkle: &str, blobs: &[&str]) -> UpdateRecord {
        let mut record = UpdateRecord::new(
            Package::new(name, "", ""),
            Package::new(name, "1", merkle),
            "test",
        );
        record.blobs = blobs.iter().map(|b| (*b).to_string()).collect();
        record
    }

    fn drain(rx: &mut EventReceiver) -> Vec<ActivationEvent> {
        let mut events = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let AppEvent::Activation(event) = msg.event {
                events.push(event);
            }
        }
        events
    }

    #[tokio::test]
    async fn test_write_replies_at_admission() {
        let h = start(FakeStore::default());

        let merkle = h
            .handle
            .write(record("/x", "Droot", &["b1", "b2"]))
            .await
            .unwrap();
        assert_eq!(merkle, "Droot");
        assert_eq!(*h.store.admitted.lock().unwrap(), vec!["Droot".to_string()]);
        assert!(h.index.is_installing("Droot"));
        assert!(h.index.list().unwrap().is_empty());

        h.handle.fulfill("b1").await.unwrap();
        h.handle.fulfill("b2").await.unwrap();
        // A write round-trip orders us after both notifications.
        h.handle.write(record("/y", "Dother", &["b9"])).await.unwrap();

        assert_eq!(
            h.index.list().unwrap(),
            vec![Package::new("/x", "1", "Droot")]
        );
    }

    #[tokio::test]
    async fn test_completion_waits_for_last_blob() {
        let h = start(FakeStore::default());

        let completion = h
            .handle
            .complete(record("/x", "Droot", &["b1", "b2"]))
            .await
            .unwrap();
        let waiter = tokio::spawn(completion.wait());

        h.handle.fulfill("b1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        h.handle.fulfill("b2").await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), "Droot");
        assert!(!h.index.is_installing("Droot"));
    }

    #[tokio::test]
    async fn test_completion_after_blobs_already_present() {
        let h = start(FakeStore::with_present(&["b1", "b2"]));

        let completion = h
            .handle
            .complete(record("/x", "Droot", &["b1", "b2"]))
            .await
            .unwrap();
        let merkle = tokio::time::timeout(Duration::from_secs(1), completion.wait())
            .await
            .expect("completion must not hang")
            .unwrap();
        assert_eq!(merkle, "Droot");
        assert!(h.store.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_blob_package_activates_immediately() {
        let h = start(FakeStore::default());
        let completion = h.handle.complete(record("/empty", "De", &[])).await.unwrap();
        assert_eq!(completion.wait().await.unwrap(), "De");
        assert_eq!(h.index.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shared_blob_releases_both_waiters() {
        let h = start(FakeStore::default());

        let first = h
            .handle
            .complete(record("/p1", "D1", &["Bshared"]))
            .await
            .unwrap();
        let second = h
            .handle
            .complete(record("/p2", "D2", &["Bshared"]))
            .await
            .unwrap();
        h.handle.fulfill("Bshared").await.unwrap();

        assert_eq!(first.wait().await.unwrap(), "D1");
        assert_eq!(second.wait().await.unwrap(), "D2");
    }

    #[tokio::test]
    async fn test_blob_failure_fails_waiters_keeps_registration() {
        let mut h = start(FakeStore::with_broken(&["bad"]));

        let completion = h
            .handle
            .complete(record("/x", "Droot", &["bad"]))
            .await
            .unwrap();
        let err = completion.wait().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Update(UpdateError::BlobFetchFailed { ref blob, .. }) if blob == "bad"
        ));
        assert!(h.index.is_installing("Droot"));

        // Content showing up later still completes the install.
        h.handle.fulfill("bad").await.unwrap();
        h.handle.write(record("/y", "Dy", &["other"])).await.unwrap();
        assert!(!h.index.is_installing("Droot"));

        let events = drain(&mut h.events);
        assert!(events
            .iter()
            .any(|e| matches!(e, ActivationEvent::BlobFetchFailed { blob, .. } if blob == "bad")));
    }

    #[tokio::test]
    async fn test_admission_failure_reaches_writer() {
        let store = FakeStore {
            reject_admission: true,
            ..FakeStore::default()
        };
        let h = start(store);
        let err = h
            .handle
            .write(record("/x", "Droot", &["b1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!h.index.is_installing("Droot"));
    }

    #[tokio::test]
    async fn test_empty_merkle_rejected() {
        let h = start(FakeStore::default());
        let err = h.handle.write(record("/x", "", &[])).await.unwrap_err();
        assert!(matches!(err, Error::Update(UpdateError::EmptyMerkle)));
    }

    #[tokio::test]
    async fn test_dropped_completion_is_forgotten() {
        let mut h = start(FakeStore::default());

        let abandoned = h
            .handle
            .complete(record("/x", "Droot", &["b1"]))
            .await
            .unwrap();
        drop(abandoned);

        h.handle.fulfill("b1").await.unwrap();
        h.handle.write(record("/y", "Dy", &["b2"])).await.unwrap();

        let events = drain(&mut h.events);
        assert!(events.iter().any(|e| matches!(
            e,
            ActivationEvent::PackageActivated { merkle, waiters: 0, .. } if merkle == "Droot"
        )));
    }

    #[tokio::test]
    async fn test_shutdown_answers_pending_waiters() {
        let mut h = start(FakeStore::default());

        let completion = h
            .handle
            .complete(record("/x", "Droot", &["never"]))
            .await
            .unwrap();
        // Make sure the completion has been registered.
        h.handle.write(record("/y", "Dy", &["b2"])).await.unwrap();

        h.handle.shutdown();
        let err = completion.wait().await.unwrap_err();
        assert!(matches!(err, Error::Update(UpdateError::MonitorClosed)));

        let err = h.handle.write(record("/z", "Dz", &[])).await.unwrap_err();
        assert!(matches!(err, Error::Update(UpdateError::MonitorClosed)));
        assert!(h.handle.is_shutdown());

        tokio::time::timeout(Duration::from_secs(1), &mut h.join)
            .await
            .expect("monitor task must exit")
            .unwrap();
        let events = drain(&mut h.events);
        assert!(events
            .iter()
            .any(|e| matches!(e, ActivationEvent::MonitorStopped { installing: 2, .. })));
    }

    #[tokio::test]
    async fn test_end_to_end_with_directory_source() {
        let repo = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join("blobs")).unwrap();
        std::fs::write(repo.path().join("blobs/b1"), b"one").unwrap();
        std::fs::write(repo.path().join("blobs/b2"), b"two").unwrap();

        let sources = SourceSet::new();
        sources
            .add(Arc::new(
                DirSource::new(SourceConfig::new("repo", repo.path().display().to_string()))
                    .unwrap(),
            ))
            .await;

        let (handle, inbox) = MonitorHandle::channel(2);
        let store =
            Arc::new(FsBlobStore::new(root.path(), sources).with_sink(Arc::new(handle.clone())));
        let index = Arc::new(DynamicIndex::new(root.path()));
        let join = ActivationMonitor::new(
            index.clone(),
            store.clone(),
            handle.clone(),
            inbox,
            &ActivationConfig {
                queue_capacity: 2,
                fetch_concurrency: 1,
            },
        )
        .spawn();

        let completion = handle
            .complete(record("/x", "Droot", &["b1", "b2"]))
            .await
            .unwrap();
        let merkle = tokio::time::timeout(Duration::from_secs(5), completion.wait())
            .await
            .expect("activation must finish")
            .unwrap();
        assert_eq!(merkle, "Droot");
        assert!(store.has_blob("b1").await);
        assert!(store.has_blob("b2").await);
        assert_eq!(store.read_meta("Droot").await.unwrap().blobs.len(), 2);
        assert_eq!(
            index.list().unwrap(),
            vec![Package::new("/x", "1", "Droot")]
        );

        handle.shutdown();
        join.await.unwrap();
    }
}
