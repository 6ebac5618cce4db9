//! Integration tests for store crate

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pkgup_errors::{Error, SourceError};
    use pkgup_source::{DirSource, SourceConfig, SourceSet};
    use pkgup_store::*;
    use pkgup_types::{Package, UpdateRecord};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActivationSink for RecordingSink {
        async fn blobs_activated(&self, blobs: Vec<String>) -> Result<(), Error> {
            self.seen.lock().unwrap().extend(blobs);
            Ok(())
        }
    }

    async fn sources_with_blob(dir: &Path, merkle: &str, content: &[u8]) -> SourceSet {
        std::fs::create_dir_all(dir.join("blobs")).unwrap();
        std::fs::write(dir.join("blobs").join(merkle), content).unwrap();
        let set = SourceSet::new();
        set.add(Arc::new(
            DirSource::new(SourceConfig::new("repo", dir.display().to_string())).unwrap(),
        ))
        .await;
        set
    }

    #[tokio::test]
    async fn test_fetch_blob_stores_and_notifies() {
        let repo = tempdir().unwrap();
        let root = tempdir().unwrap();
        let sources = sources_with_blob(repo.path(), "b1", b"payload").await;
        let sink = Arc::new(RecordingSink::default());
        let store = FsBlobStore::new(root.path(), sources).with_sink(sink.clone());

        assert!(!store.has_blob("b1").await);
        store.fetch_blob("b1").await.unwrap();
        assert!(store.has_blob("b1").await);
        assert_eq!(store.read_blob("b1").await.unwrap(), b"payload");
        assert_eq!(*sink.seen.lock().unwrap(), vec!["b1".to_string()]);

        // Present blobs are announced again without refetching.
        store.fetch_blob("b1").await.unwrap();
        assert_eq!(sink.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_missing_blob_fails_without_notify() {
        let repo = tempdir().unwrap();
        let root = tempdir().unwrap();
        let sources = sources_with_blob(repo.path(), "b1", b"payload").await;
        let sink = Arc::new(RecordingSink::default());
        let store = FsBlobStore::new(root.path(), sources).with_sink(sink.clone());

        let err = store.fetch_blob("absent").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Source(SourceError::NoUpdateContent { .. })
        ));
        assert!(sink.seen.lock().unwrap().is_empty());
        assert!(!store.has_blob("absent").await);
    }

    #[tokio::test]
    async fn test_no_sources_is_no_content() {
        let root = tempdir().unwrap();
        let store = FsBlobStore::new(root.path(), SourceSet::new());
        assert!(store.fetch_blob("b1").await.is_err());
    }

    #[tokio::test]
    async fn test_admit_writes_meta() {
        let root = tempdir().unwrap();
        let store = FsBlobStore::new(root.path(), SourceSet::new());
        let mut record = UpdateRecord::new(
            Package::new("/foo", "", ""),
            Package::new("/foo", "2", "m2"),
            "repo",
        );
        record.blobs.insert("b2".into());
        record.blobs.insert("b1".into());

        store.admit(&record).await.unwrap();
        let meta = store.read_meta("m2").await.unwrap();
        assert_eq!(meta.name, "/foo");
        assert_eq!(meta.version, "2");
        assert_eq!(meta.blobs, vec!["b1".to_string(), "b2".to_string()]);

        // Admitting the same update twice is fine.
        store.admit(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_admitted_lists_stored_meta() {
        let root = tempdir().unwrap();
        let store = FsBlobStore::new(root.path(), SourceSet::new());
        assert!(store.admitted().await.unwrap().is_empty());

        for (version, merkle) in [("2", "m2"), ("1", "m1")] {
            let mut record = UpdateRecord::new(
                Package::new("/foo", "", ""),
                Package::new("/foo", version, merkle),
                "repo",
            );
            record.blobs.insert(format!("b{version}"));
            store.admit(&record).await.unwrap();
        }
        let meta_dir = root.path().join("meta");
        std::fs::write(meta_dir.join("broken.json"), "{").unwrap();
        std::fs::write(meta_dir.join(".half.tmp"), "{}").unwrap();

        let admitted = store.admitted().await.unwrap();
        let merkles: Vec<_> = admitted.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(merkles, vec!["m1", "m2"]);
        assert_eq!(admitted[1].1.version, "2");
        assert_eq!(admitted[1].1.blobs, vec!["b2".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_digest() {
        let root = tempdir().unwrap();
        let store = FsBlobStore::new(root.path(), SourceSet::new());
        assert!(store.blob_path("../etc/passwd").is_err());
        assert!(store.blob_path("").is_err());
        assert!(!store.has_blob("../x").await);
    }
}
