//! Session behaviour with an in-memory gateway and push connector.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, oneshot};
use tokio::time::timeout;

use pareto_core::{Config, Participant, ParticipantId, Sprint, SprintTemplate};
use pareto_live::{
    run, ApiError, ChannelError, ConnectionState, Connector, FrameStream, Inbound, LiveSession,
    SessionEvent, SprintApi,
};
use pareto_sync::Notice;

const WAIT: Duration = Duration::from_secs(5);

struct FakeApi {
    sprints: Result<Vec<Value>, String>,
}

impl FakeApi {
    fn with(sprints: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            sprints: Ok(sprints),
        })
    }

    fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            sprints: Err(reason.to_string()),
        })
    }
}

impl SprintApi for FakeApi {
    fn fetch_mentee_sprints(&self, _mentee: &ParticipantId) -> Result<Vec<Sprint>, ApiError> {
        match &self.sprints {
            Ok(values) => Ok(values
                .iter()
                .map(|v| serde_json::from_value(v.clone()).expect("sprint"))
                .collect()),
            Err(reason) => Err(ApiError::Transport {
                url: "http://gw/sprints/mentee/1".to_string(),
                reason: reason.clone(),
            }),
        }
    }

    fn create_sprint(&self, _sprint: &Sprint) -> Result<(), ApiError> {
        Ok(())
    }

    fn fetch_templates(&self) -> Result<Vec<SprintTemplate>, ApiError> {
        Ok(Vec::new())
    }

    fn fetch_users(&self) -> Result<Vec<Participant>, ApiError> {
        Ok(Vec::new())
    }
}

/// A gateway client whose blocking call never returns normally.
struct PanickingApi;

impl SprintApi for PanickingApi {
    fn fetch_mentee_sprints(&self, _mentee: &ParticipantId) -> Result<Vec<Sprint>, ApiError> {
        panic!("gateway client crashed");
    }

    fn create_sprint(&self, _sprint: &Sprint) -> Result<(), ApiError> {
        Ok(())
    }

    fn fetch_templates(&self) -> Result<Vec<SprintTemplate>, ApiError> {
        Ok(Vec::new())
    }

    fn fetch_users(&self) -> Result<Vec<Participant>, ApiError> {
        Ok(Vec::new())
    }
}

/// Delivers `frames` on the first connection, then stays open.
#[derive(Clone, Default)]
struct Push {
    frames: Vec<Inbound>,
    dialed: Arc<Mutex<Vec<String>>>,
}

impl Push {
    fn sending(frames: Vec<Value>) -> Self {
        Self {
            frames: frames
                .into_iter()
                .map(|v| match v {
                    Value::String(raw) => Inbound::Text(raw),
                    other => Inbound::Text(other.to_string()),
                })
                .collect(),
            dialed: Arc::default(),
        }
    }

    fn dialed(&self) -> Vec<String> {
        self.dialed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for Push {
    async fn connect(&self, address: &str) -> Result<FrameStream, ChannelError> {
        self.dialed.lock().unwrap().push(address.to_string());
        let frames: Vec<_> = self.frames.iter().cloned().map(Ok).collect();
        Ok(stream::iter(frames).chain(stream::pending()).boxed())
    }
}

fn config() -> Config {
    Config {
        wss_endpoint: "ws://push.test".to_string(),
        ..Config::default()
    }
}

fn score(sprint: &Sprint) -> Option<i64> {
    sprint.extra_field("score").and_then(Value::as_i64)
}

#[tokio::test]
async fn fetch_failure_starts_degraded() {
    let push = Push::default();
    let (tx, mut notices) = broadcast::channel(8);
    let session = LiveSession::start_with(
        FakeApi::failing("connection refused"),
        push.clone(),
        &config(),
        ParticipantId::from(1),
        tx,
    )
    .await;

    assert!(session.degraded().expect("degraded").contains("connection refused"));
    assert!(session.snapshot().is_empty());
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(session.address().is_none());
    assert!(push.dialed().is_empty());
    assert!(matches!(notices.try_recv(), Ok(Notice::Error(msg)) if msg.contains("could not load")));

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn crashed_fetch_task_starts_degraded() {
    let push = Push::default();
    let session = LiveSession::start(
        Arc::new(PanickingApi),
        push.clone(),
        &config(),
        ParticipantId::from(1),
    )
    .await;

    let reason = session.degraded().expect("degraded");
    assert!(reason.contains("could not load sprints"), "{reason}");
    assert!(reason.contains("blocking request task failed"), "{reason}");
    assert!(push.dialed().is_empty());
}

#[tokio::test]
async fn zero_sprints_opens_no_channel() {
    let push = Push::default();
    let session = LiveSession::start(
        FakeApi::with(Vec::new()),
        push.clone(),
        &config(),
        ParticipantId::from(1),
    )
    .await;

    assert!(session.degraded().is_none());
    assert!(session.subscription().is_empty());
    assert!(session.states().is_none());
    assert!(push.dialed().is_empty());
}

#[tokio::test]
async fn invalid_push_endpoint_keeps_fetched_sprints() {
    let push = Push::default();
    let session = LiveSession::start(
        FakeApi::with(vec![json!({"id": "a"})]),
        push.clone(),
        &Config {
            wss_endpoint: "https://push.test".to_string(),
            ..Config::default()
        },
        ParticipantId::from(1),
    )
    .await;

    assert_eq!(session.snapshot().len(), 1);
    assert!(session.degraded().is_some());
    assert!(push.dialed().is_empty());
}

#[tokio::test]
async fn pushed_frames_are_reconciled_into_the_view() {
    let push = Push::sending(vec![
        json!({"id": "a", "score": 5}),
        json!({"message": "coach joined"}),
        json!({"id": "zzz", "score": 1}),
        json!("not json"),
        json!({"id": "b", "score": 9}),
    ]);
    let (tx, mut notices) = broadcast::channel(8);
    let session = LiveSession::start_with(
        FakeApi::with(vec![
            json!({"id": "a", "score": 1}),
            json!({"id": "b", "score": 2}),
        ]),
        push.clone(),
        &config(),
        ParticipantId::from(1),
        tx,
    )
    .await;
    assert_eq!(session.address(), Some("ws://push.test?key0=a&key1=b"));

    let mut view = session.subscribe();
    timeout(WAIT, async {
        while view.get(&"b".into()).as_ref().and_then(score) != Some(9) {
            view.changed().await.expect("store alive");
        }
    })
    .await
    .expect("last frame applied");

    let sprints = session.snapshot();
    let summary: Vec<_> = sprints.iter().map(|s| (s.id.0.as_str(), score(s))).collect();
    assert_eq!(summary, vec![("a", Some(5)), ("b", Some(9))]);

    assert_eq!(
        notices.try_recv().expect("status"),
        Notice::Status("coach joined".to_string())
    );
    assert!(matches!(notices.try_recv(), Ok(Notice::Error(_))));
    assert_eq!(push.dialed(), vec!["ws://push.test?key0=a&key1=b"]);

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn run_reports_start_updates_and_stops_on_signal() {
    let push = Push::sending(vec![json!({"id": "a", "score": 7})]);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut stop_tx = Some(stop_tx);
    let (mut updated, mut connected) = (false, false);

    let sink = events.clone();
    let result = timeout(
        WAIT,
        run(
            FakeApi::with(vec![json!({"id": "a", "score": 1})]),
            push,
            &config(),
            ParticipantId::from(1),
            async {
                let _ = stop_rx.await;
            },
            move |event| {
                match &event {
                    SessionEvent::Updated(_) => updated = true,
                    SessionEvent::State(state) => connected |= state.is_connected(),
                    _ => {}
                }
                if updated && connected {
                    if let Some(tx) = stop_tx.take() {
                        let _ = tx.send(());
                    }
                }
                sink.lock().unwrap().push(event);
            },
        ),
    )
    .await
    .expect("run finished");
    result.expect("clean shutdown");

    let events = events.lock().unwrap();
    match &events[0] {
        SessionEvent::Started { sprints, address } => {
            assert_eq!(sprints.len(), 1);
            assert_eq!(address.as_deref(), Some("ws://push.test?key0=a"));
        }
        other => panic!("first event should be Started, got {other:?}"),
    }
    let updated = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::Updated(snapshot) => Some(snapshot.clone()),
            _ => None,
        })
        .expect("update event");
    assert_eq!(score(&updated[0]), Some(7));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::State(ConnectionState::Connected))));
}
