//! Integration tests for source crate

#[cfg(test)]
mod tests {
    use pkgup_errors::{Error, SourceError};
    use pkgup_source::*;
    use pkgup_types::{Package, PackageMeta};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn publish(dir: &Path, name: &str, version: &str, merkle: &str, blobs: &[(&str, &[u8])]) {
        let target = dir.join("targets").join(name.trim_start_matches('/'));
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join(version), format!("{merkle}\n")).unwrap();

        std::fs::create_dir_all(dir.join("meta")).unwrap();
        let meta = PackageMeta {
            name: name.to_string(),
            version: version.to_string(),
            blobs: blobs.iter().map(|(b, _)| (*b).to_string()).collect(),
        };
        std::fs::write(
            dir.join("meta").join(format!("{merkle}.json")),
            serde_json::to_vec(&meta).unwrap(),
        )
        .unwrap();

        std::fs::create_dir_all(dir.join("blobs")).unwrap();
        for (blob, content) in blobs {
            std::fs::write(dir.join("blobs").join(blob), content).unwrap();
        }
    }

    fn dir_source(id: &str, dir: &Path) -> DirSource {
        DirSource::new(SourceConfig::new(id, dir.display().to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_latest_version_is_lexically_last() {
        let temp = tempdir().unwrap();
        publish(temp.path(), "/foo", "1", "m1", &[]);
        publish(temp.path(), "/foo", "2", "m2", &[]);
        let src = dir_source("local", temp.path());

        let req = Package::new("/foo", "", "");
        let updates = src.available_updates(&[req.clone()]).await.unwrap();
        assert_eq!(updates[&req], Package::new("/foo", "2", "m2"));
    }

    #[tokio::test]
    async fn test_pinned_version_and_current_merkle() {
        let temp = tempdir().unwrap();
        publish(temp.path(), "/foo", "1", "m1", &[]);
        publish(temp.path(), "/foo", "2", "m2", &[]);
        let src = dir_source("local", temp.path());

        let pinned = Package::new("/foo", "1", "");
        let current = Package::new("/foo", "", "m2");
        let missing = Package::new("/bar", "", "");
        let updates = src
            .available_updates(&[pinned.clone(), current.clone(), missing.clone()])
            .await
            .unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[&pinned].merkle, "m1");
        assert!(!updates.contains_key(&current));
        assert!(!updates.contains_key(&missing));
    }

    #[tokio::test]
    async fn test_fetch_metadata_and_blob() {
        let temp = tempdir().unwrap();
        publish(
            temp.path(),
            "/foo",
            "1",
            "m1",
            &[("b1", b"one"), ("b2", b"two")],
        );
        let src = dir_source("local", temp.path());

        let meta = src
            .fetch_metadata(&Package::new("/foo", "1", "m1"))
            .await
            .unwrap();
        assert_eq!(meta.blobs, vec!["b1".to_string(), "b2".to_string()]);
        assert_eq!(src.fetch_blob("b2").await.unwrap(), b"two");

        let err = src.fetch_blob("nope").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Source(SourceError::NoUpdateContent { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_metadata() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("meta")).unwrap();
        std::fs::write(temp.path().join("meta/bad.json"), "{not json").unwrap();
        let src = dir_source("local", temp.path());

        let err = src
            .fetch_metadata(&Package::new("/foo", "1", "bad"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Source(SourceError::MalformedMetadata { .. })
        ));
    }

    #[tokio::test]
    async fn test_source_set_ordering_and_duplicates() {
        let temp = tempdir().unwrap();
        let set = SourceSet::new();
        assert!(set.add(Arc::new(dir_source("b", temp.path()))).await);
        assert!(set.add(Arc::new(dir_source("a", temp.path()))).await);
        assert!(!set.add(Arc::new(dir_source("a", temp.path()))).await);

        assert_eq!(set.ids().await, vec!["b".to_string(), "a".to_string()]);
        assert!(set.remove("b").await);
        assert!(!set.remove("b").await);
        assert_eq!(set.ids().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let repo = tempdir().unwrap();
        let state = tempdir().unwrap();

        let set = SourceSet::new();
        let config = SourceConfig::new("file:///srv/one", "file:///srv/one")
            .with_limits(30, 2)
            .with_pub_key(Some("key".into()));
        set.add(Arc::new(DirSource::new(config.clone()).unwrap()))
            .await;
        set.add(Arc::new(dir_source("two", repo.path()))).await;
        set.save(state.path()).await.unwrap();

        let restored = SourceSet::new();
        assert_eq!(restored.load(state.path()).await.unwrap(), 2);
        assert_eq!(restored.ids().await, set.ids().await);
        let one = restored.get("file:///srv/one").await.unwrap();
        assert_eq!(one.source().config(), &config);

        // Loading again adds nothing new.
        assert_eq!(restored.load(state.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let state = tempdir().unwrap();
        let set = SourceSet::new();
        assert_eq!(set.load(state.path()).await.unwrap(), 0);
        assert!(set.is_empty().await);
    }

    #[tokio::test]
    async fn test_registered_source_rate_limit() {
        let temp = tempdir().unwrap();
        let config = SourceConfig::new("tight", temp.path().display().to_string())
            .with_limits(3600, 1);
        let registered = RegisteredSource::new(Arc::new(DirSource::new(config).unwrap()));
        assert!(registered.try_check());
        assert!(!registered.try_check());
    }
}
