//! Loader integration tests against policy files on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gateway_config::{
    build_routing_chains, ConfigPublisher, JsonSessionPolicyParser, Loader, RoutingPolicy,
    SessionPolicies,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const SESSIONS: &str = r#"[
    {"id": 1, "traffic_matcher": "true", "prefixes": ["10.0.0.0/8", "2001:db8::/32"]},
    {"id": 2, "traffic_matcher": "dscp=0x2", "prefixes": ["10.0.0.0/8", "2001:db8::/32"]},
    {"id": 3, "traffic_matcher": "dscp=0x4", "prefixes": ["192.168.0.0/16"]}
]"#;

const ROUTING: &str = r#"{
    "default_action": "reject",
    "rules": [
        {"action": "accept", "prefix": "10.0.0.0/8"},
        {"action": "accept", "prefix": "2001:db8::/32"}
    ]
}"#;

struct ChannelPublisher(mpsc::UnboundedSender<(SessionPolicies, RoutingPolicy)>);

impl ConfigPublisher for ChannelPublisher {
    fn publish(&self, sessions: SessionPolicies, routing: RoutingPolicy) {
        let _ = self.0.send((sessions, routing));
    }
}

struct Harness {
    _dir: TempDir,
    sessions_path: PathBuf,
    trigger: mpsc::Sender<()>,
    published: mpsc::UnboundedReceiver<(SessionPolicies, RoutingPolicy)>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

fn write(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

fn start(sessions: &str, routing: &str) -> Harness {
    start_with(sessions, Some(routing), false)
}

/// Starts a loader; `routing = None` leaves the routing policy file absent.
/// With `routing_at_default`, the routing policy path is also the loader's
/// default routing policy path.
fn start_with(sessions: &str, routing: Option<&str>, routing_at_default: bool) -> Harness {
    let dir = TempDir::new().unwrap();
    let sessions_path = dir.path().join("session.policy");
    let routing_path = dir.path().join("ip_routing.policy");
    write(&sessions_path, sessions);
    if let Some(routing) = routing {
        write(&routing_path, routing);
    }
    let default_routing_path = if routing_at_default {
        routing_path.clone()
    } else {
        dir.path().join("default").join("ip_routing.policy")
    };

    let (trigger, trigger_rx) = mpsc::channel(4);
    let (published_tx, published) = mpsc::unbounded_channel();
    let loader = Loader::builder()
        .session_policies_file(&sessions_path)
        .routing_policy_file(&routing_path)
        .default_routing_policy_file(default_routing_path)
        .publisher(Arc::new(ChannelPublisher(published_tx)))
        .trigger(trigger_rx)
        .parser(Arc::new(JsonSessionPolicyParser))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loader.run(cancel).await.unwrap();
        }
    });

    Harness {
        _dir: dir,
        sessions_path,
        trigger,
        published,
        cancel,
        task,
    }
}

#[tokio::test]
async fn test_trigger_publishes_configuration() {
    let mut h = start(SESSIONS, ROUTING);

    h.trigger.send(()).await.unwrap();
    let (sessions, routing) = timeout(Duration::from_secs(5), h.published.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(sessions.len(), 3);
    assert_eq!(routing.rules.len(), 2);

    let chains = build_routing_chains(&sessions, &routing);
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].traffic_matchers.len(), 2);

    h.cancel.cancel();
    h.task.await.unwrap();
}

#[tokio::test]
async fn test_failed_reload_publishes_nothing() {
    let mut h = start(SESSIONS, ROUTING);

    h.trigger.send(()).await.unwrap();
    timeout(Duration::from_secs(5), h.published.recv())
        .await
        .unwrap()
        .unwrap();

    write(&h.sessions_path, "not json");
    h.trigger.send(()).await.unwrap();
    // The reload runs in the same poll as the receive that frees the slot.
    while h.trigger.capacity() < h.trigger.max_capacity() {
        tokio::task::yield_now().await;
    }
    assert!(h.published.try_recv().is_err());

    // Fix the file and reload again: only the good configuration arrives.
    write(&h.sessions_path, r#"[{"id": 9, "traffic_matcher": "true"}]"#);
    h.trigger.send(()).await.unwrap();

    let (sessions, _) = timeout(Duration::from_secs(5), h.published.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions.iter().next().unwrap().id.get(), 9);

    h.cancel.cancel();
    h.task.await.unwrap();
    assert!(h.published.try_recv().is_err());
}

#[tokio::test]
async fn test_closed_trigger_stops_loader() {
    let h = start(SESSIONS, ROUTING);

    drop(h.trigger);
    timeout(Duration::from_secs(5), h.task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_cancel_stops_loader() {
    let h = start(SESSIONS, ROUTING);

    h.cancel.cancel();
    timeout(Duration::from_secs(5), h.task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_missing_default_routing_policy_publishes_deny_all() {
    let mut h = start_with(SESSIONS, None, true);

    h.trigger.send(()).await.unwrap();
    let (sessions, routing) = timeout(Duration::from_secs(5), h.published.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(sessions.len(), 3);
    assert_eq!(routing, RoutingPolicy::deny_all());
    assert!(build_routing_chains(&sessions, &routing).is_empty());

    h.cancel.cancel();
    h.task.await.unwrap();
}

#[tokio::test]
async fn test_missing_routing_policy_elsewhere_publishes_nothing() {
    let mut h = start_with(SESSIONS, None, false);

    h.trigger.send(()).await.unwrap();
    while h.trigger.capacity() < h.trigger.max_capacity() {
        tokio::task::yield_now().await;
    }
    assert!(h.published.try_recv().is_err());

    h.cancel.cancel();
    h.task.await.unwrap();
}
