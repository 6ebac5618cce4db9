//! Integration tests for config

#[cfg(test)]
mod tests {
    use pkgup_config::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 5] = [
        "PKGUP_ROOT",
        "PKGUP_QUEUE_CAPACITY",
        "PKGUP_FETCH_CONCURRENCY",
        "PKGUP_CHECK_INTERVAL",
        "PKGUP_CHECK_LIMIT",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
root = "/tmp/pkgup-test"

[monitor]
queue_capacity = 8

[sources]
check_limit = 3

[[sources.directories]]
id = "local"
path = "/srv/repo"
check_interval = 5
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.root(), PathBuf::from("/tmp/pkgup-test"));
        assert_eq!(config.monitor.queue_capacity, 8);
        assert_eq!(config.monitor.fetch_concurrency, 4);
        assert_eq!(config.sources.check_interval, 60);
        assert_eq!(config.sources.check_limit, 3);
        assert_eq!(config.sources.directories.len(), 1);
        assert_eq!(config.sources.directories[0].id, "local");
        assert_eq!(config.sources.directories[0].check_interval, Some(5));
        assert_eq!(config.sources.directories[0].check_limit, None);
    }

    #[tokio::test]
    async fn test_invalid_toml_is_parse_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[monitor\nqueue_capacity = ").unwrap();
        let err = Config::load_from_file(temp_file.path()).await.unwrap_err();
        assert!(matches!(
            err,
            pkgup_errors::Error::Config(pkgup_errors::ConfigError::ParseError { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[monitor]\nqueue_capacity = 0").unwrap();
        assert!(Config::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_derived_paths() {
        let mut config = Config::default();
        assert_eq!(config.root(), PathBuf::from(fixed_paths::DEFAULT_ROOT));
        config.general.root = Some(PathBuf::from("/data"));
        assert_eq!(config.packages_path(), PathBuf::from("/data/packages"));
        assert_eq!(config.blobs_path(), PathBuf::from("/data/blobs"));
        assert_eq!(config.meta_path(), PathBuf::from("/data/meta"));
        assert_eq!(config.sources_path(), PathBuf::from("/data/sources"));
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("PKGUP_ROOT", "/srv/pkgup");
        std::env::set_var("PKGUP_QUEUE_CAPACITY", "16");
        std::env::set_var("PKGUP_CHECK_LIMIT", "2");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.root(), PathBuf::from("/srv/pkgup"));
        assert_eq!(config.monitor.queue_capacity, 16);
        assert_eq!(config.sources.check_limit, 2);

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("PKGUP_FETCH_CONCURRENCY", "many");

        let mut config = Config::default();
        let result = config.merge_env();
        assert!(result.is_err());

        clear_env();
    }
}
