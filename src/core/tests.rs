//! End-to-end tests for the core module
//!
//! These drive the wired container the way the presentation tier does: raw
//! calls in, envelopes out.

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use serde_json::{json, Value};
    use tokio::io::{duplex, AsyncReadExt};
    use uuid::Uuid;

    use crate::{
        config::{ChannelMode, Config, StoreBackend},
        core::{container::ServiceContainer, error::BridgeError},
        handler::HandlerDeps,
        routing::Verb,
        store::{MemoryStore, Store},
        transport::{Envelope, IpcCall},
    };

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn container() -> ServiceContainer {
        init_log();
        ServiceContainer::build(Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_classroom_round_trip() {
        let router = container().router();

        let created = router
            .dispatch(IpcCall::new(Verb::Post, "classrooms").with_data(json!({
                "classId": "A1B2C",
                "title": "Geometry",
                "members": [{"name": "Ana", "role": "teacher"}]
            })))
            .await;
        assert!(created.is_success(), "{created:?}");

        let fetched = router
            .dispatch(IpcCall::new(Verb::Get, "classrooms/A1B2C"))
            .await;
        assert_eq!(fetched.data().unwrap()["classId"], "A1B2C");
        assert_eq!(fetched.data(), created.data());
    }

    #[tokio::test]
    async fn test_missing_classroom_is_not_found() {
        let envelope = container()
            .router()
            .dispatch(IpcCall::new(Verb::Get, "classrooms/A1B2C"))
            .await;
        let error = envelope.error().unwrap();
        assert_eq!(error.code, "NOT_FOUND");
        assert!(!error.message.is_empty());
    }

    #[tokio::test]
    async fn test_users_create_generates_id() {
        let result = container()
            .bus()
            .execute("users.create", json!({"name": "Ana"}))
            .await;
        let payload = result.into_result().unwrap();
        assert_eq!(payload["name"], "Ana");
        let id = payload["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_payload_survives_the_wire() {
        let router = container().router();
        let sent = json!({
            "name": "Zoë \"Z\" Ñúñez",
            "email": "zoe@example.com"
        });
        let envelope = router
            .dispatch(IpcCall::new(Verb::Post, "users").with_data(sent.clone()))
            .await;

        let text = serde_json::to_string(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, envelope);
        let data = decoded.data().unwrap();
        assert_eq!(data["name"], sent["name"]);
        assert_eq!(data["email"], sent["email"]);
    }

    #[tokio::test]
    async fn test_concurrent_creates_are_independent() {
        init_log();
        let counter = Arc::new(AtomicUsize::new(0));
        let ids = counter.clone();
        let deps = HandlerDeps::new(Arc::new(MemoryStore::new())).with_id_generator(Arc::new(
            move || format!("user-{:03}", ids.fetch_add(1, Ordering::SeqCst)),
        ));
        let container = ServiceContainer::with_deps(Config::default(), deps).unwrap();
        let router = container.router();

        let mut tasks = Vec::new();
        for n in 0..20 {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                router
                    .dispatch(
                        IpcCall::new(Verb::Post, "users")
                            .with_data(json!({ "name": format!("user {n}") })),
                    )
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_success());
        }

        let listed = router.dispatch(IpcCall::new(Verb::Get, "users")).await;
        assert_eq!(listed.data().unwrap().as_array().unwrap().len(), 20);
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_channel_server_end_to_end() {
        let container = container();
        let input = concat!(
            r#"{"id": "c1", "verb": "POST", "path": "users", "data": {"name": "Ana"}}"#,
            "\n",
            r#"{"id": "c2", "verb": "GET", "path": "users/does-not-exist"}"#,
            "\n",
            r#"{"id": "c3", "verb": "GET", "path": "system/health"}"#,
            "\n"
        );

        let (mut egress, writer) = duplex(1024 * 1024);
        container
            .channel_server()
            .serve(input.as_bytes(), writer)
            .await
            .unwrap();
        let mut output = String::new();
        egress.read_to_string(&mut output).await.unwrap();

        let replies: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);

        let reply = |id: &str| replies.iter().find(|r| r["id"] == id).cloned().unwrap();
        assert_eq!(reply("c1")["success"], true);
        assert_eq!(reply("c1")["data"]["name"], "Ana");
        assert_eq!(reply("c2")["error"]["code"], "NOT_FOUND");
        assert_eq!(reply("c3")["data"]["queries"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_container_follows_config() {
        init_log();
        let conf = Config::from_yaml(
            r#"
transport:
  mode: per_route
  max_in_flight: 2
  call_timeout_ms: 1000
"#,
        )
        .unwrap();
        let container = ServiceContainer::build(conf).unwrap();
        assert_eq!(container.config().transport.mode, ChannelMode::PerRoute);
        assert_eq!(container.store().name(), "memory");
        assert_eq!(container.router().len(), 7);
    }

    #[test]
    fn test_etcd_backend_requires_settings() {
        init_log();
        let mut conf = Config::default();
        conf.store.backend = StoreBackend::Etcd;
        match ServiceContainer::build(conf) {
            Err(BridgeError::Configuration(msg)) => assert!(msg.contains("store.etcd")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("etcd backend built without settings"),
        }
    }
}
