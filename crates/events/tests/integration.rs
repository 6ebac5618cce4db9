//! Integration tests for events

#[cfg(test)]
mod tests {
    use pkgup_events::*;

    #[tokio::test]
    async fn test_event_sender_ext() {
        let (tx, mut rx) = channel();

        tx.emit_operation_failed("update /foo", "no update");
        tx.emit_debug("test debug");

        let msg1 = rx.recv().await.unwrap();
        assert!(matches!(
            msg1.event,
            AppEvent::General(GeneralEvent::OperationFailed { .. })
        ));
        assert_eq!(msg1.meta.level, EventLevel::Error);

        let msg2 = rx.recv().await.unwrap();
        assert!(matches!(
            msg2.event,
            AppEvent::General(GeneralEvent::DebugLog { .. })
        ));
        assert_eq!(msg2.meta.source, EventSource::General);
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[tokio::test]
    async fn test_missing_sender_is_silent() {
        let none: Option<EventSender> = None;
        none.emit_warning("nobody listening");
    }

    #[tokio::test]
    async fn test_correlated_emit() {
        let (tx, mut rx) = channel();
        tx.emit_correlated(
            "root1",
            AppEvent::Activation(ActivationEvent::BlobActivated { blob: "b1".into() }),
        );
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.meta.merkle.as_deref(), Some("root1"));
        assert_eq!(msg.meta.source, EventSource::Activation);
        assert_eq!(msg.meta.level, EventLevel::Debug);
    }

    #[test]
    fn test_levels_and_targets() {
        let event = AppEvent::Update(UpdateEvent::SourceRateLimited {
            source_id: "local".into(),
            check_limit: 1,
            interval_secs: 60,
        });
        assert_eq!(event.log_level(), tracing::Level::WARN);
        assert_eq!(event.log_target(), "pkgup::events::update");
    }

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::Activation(ActivationEvent::PackageActivated {
            package: "/a".into(),
            merkle: "root".into(),
            waiters: 2,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "activation");
        assert_eq!(json["event"]["type"], "PackageActivated");
    }

    #[test]
    fn test_meta_carries_merkle_only_when_set() {
        let meta = EventMeta::new(tracing::Level::INFO, EventSource::Update);
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("merkle").is_none());
        assert_eq!(json["source"], "update");
        assert_eq!(json["level"], "info");

        let json = serde_json::to_value(meta.for_package("root1")).unwrap();
        assert_eq!(json["merkle"], "root1");
    }
}
