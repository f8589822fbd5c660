//! Channel manager: owns one push connection, feeds every inbound text frame
//! to a [`FrameHandler`] and reconnects with [`Backoff`] when the connection
//! drops.
//!
//! A dial must finish within the policy's connect timeout, and a connected
//! stream that stays silent past the idle timeout is treated as dropped. The
//! failure count only resets once a connection delivers something, so a
//! server that accepts and immediately hangs up still exhausts the budget.

use std::fmt;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use pareto_core::ReconnectConfig;
use pareto_sync::Reconciler;

use crate::backoff::Backoff;
use crate::error::ChannelError;
use crate::transport::{Connector, FrameStream, Inbound};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    Closed { reason: CloseReason },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting in {}ms (attempt {attempt})", delay.as_millis())
            }
            ConnectionState::Closed { reason } => write!(f, "closed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Requested,
    GaveUp { attempts: u32, last_error: String },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => write!(f, "requested"),
            CloseReason::GaveUp {
                attempts,
                last_error,
            } => write!(f, "gave up after {attempts} attempts ({last_error})"),
        }
    }
}

/// Receives each inbound text frame, in arrival order. A frame is fully
/// handled before the next one is read.
pub trait FrameHandler: Send + 'static {
    fn handle_frame(&mut self, raw: &str);
}

impl<F> FrameHandler for F
where
    F: FnMut(&str) + Send + 'static,
{
    fn handle_frame(&mut self, raw: &str) {
        self(raw)
    }
}

impl FrameHandler for Reconciler {
    fn handle_frame(&mut self, raw: &str) {
        // Malformed frames are already logged and reported by the reconciler.
        let _ = self.handle_raw(raw);
    }
}

pub struct ChannelManager<C: Connector> {
    connector: C,
    address: String,
    policy: ReconnectConfig,
}

impl<C: Connector> ChannelManager<C> {
    pub fn new(connector: C, address: impl Into<String>, policy: ReconnectConfig) -> Self {
        Self {
            connector,
            address: address.into(),
            policy,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Start the connection task.
    pub fn spawn<H: FrameHandler>(self, handler: H) -> ChannelHandle {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let shutdown_rx = shutdown_tx.subscribe();

        let task = tokio::spawn(connection_task(
            self.connector,
            self.address,
            self.policy,
            handler,
            state_tx,
            shutdown_rx,
        ));

        ChannelHandle {
            state: state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

/// Control side of a running channel. Dropping it stops the channel.
pub struct ChannelHandle {
    state: watch::Receiver<ConnectionState>,
    shutdown: broadcast::Sender<()>,
    task: Option<JoinHandle<Result<(), ChannelError>>>,
}

impl ChannelHandle {
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn states(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stop the channel and wait for the task. Reports the give-up error if
    /// the channel had already exhausted its attempts.
    pub async fn close(mut self) -> Result<(), ChannelError> {
        let _ = self.shutdown.send(());
        match self.task.take() {
            Some(task) => handle_join(task.await),
            None => Ok(()),
        }
    }

    /// Wait until the task ends on its own (give-up) or is told to stop.
    pub async fn finished(&mut self) -> Result<(), ChannelError> {
        match self.task.take() {
            Some(task) => handle_join(task.await),
            None => Ok(()),
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum PumpEnd {
    Shutdown,
    Disconnected(String),
}

async fn connection_task<C: Connector, H: FrameHandler>(
    connector: C,
    address: String,
    policy: ReconnectConfig,
    mut handler: H,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ChannelError> {
    let mut backoff = Backoff::new(&policy);

    loop {
        let attempt = backoff.failures() + 1;
        state_tx.send_replace(ConnectionState::Connecting { attempt });
        tracing::debug!(%address, attempt, "opening channel");

        let connected = tokio::select! {
            _ = shutdown_rx.recv() => {
                state_tx.send_replace(closed_requested());
                return Ok(());
            }
            result = tokio::time::timeout(policy.connect_timeout(), connector.connect(&address)) => {
                result.unwrap_or_else(|_| {
                    Err(ChannelError::Timeout {
                        address: address.clone(),
                        after_ms: policy.connect_timeout_ms,
                    })
                })
            }
        };

        let last_error = match connected {
            Ok(mut stream) => {
                state_tx.send_replace(ConnectionState::Connected);
                tracing::info!(%address, "channel connected");
                let end = pump(
                    &mut stream,
                    &mut handler,
                    &mut backoff,
                    policy.idle_timeout(),
                    &mut shutdown_rx,
                )
                .await;
                match end {
                    PumpEnd::Shutdown => {
                        state_tx.send_replace(closed_requested());
                        tracing::info!("channel closed on request");
                        return Ok(());
                    }
                    PumpEnd::Disconnected(reason) => {
                        tracing::warn!(%reason, "channel disconnected");
                        reason
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, attempt, "channel connect failed");
                err.to_string()
            }
        };

        let Some(delay) = backoff.next_delay() else {
            let attempts = backoff.failures();
            tracing::error!(attempts, error = %last_error, "giving up on channel");
            state_tx.send_replace(ConnectionState::Closed {
                reason: CloseReason::GaveUp {
                    attempts,
                    last_error: last_error.clone(),
                },
            });
            return Err(ChannelError::GaveUp {
                attempts,
                last_error,
            });
        };

        state_tx.send_replace(ConnectionState::Reconnecting {
            attempt: backoff.failures() + 1,
            delay,
        });
        tracing::debug!(delay_ms = delay.as_millis() as u64, "waiting before reconnect");

        tokio::select! {
            _ = shutdown_rx.recv() => {
                state_tx.send_replace(closed_requested());
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn pump<H: FrameHandler>(
    stream: &mut FrameStream,
    handler: &mut H,
    backoff: &mut Backoff,
    idle_timeout: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> PumpEnd {
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        let item = tokio::select! {
            _ = shutdown_rx.recv() => return PumpEnd::Shutdown,
            _ = &mut idle => {
                return PumpEnd::Disconnected(format!(
                    "no traffic for {}ms",
                    idle_timeout.as_millis()
                ));
            }
            next = stream.next() => next,
        };

        match item {
            Some(Ok(Inbound::Close)) => {
                return PumpEnd::Disconnected("closed by server".to_string())
            }
            Some(Err(err)) => return PumpEnd::Disconnected(err.to_string()),
            None => return PumpEnd::Disconnected("stream ended".to_string()),
            Some(Ok(inbound)) => {
                backoff.reset();
                idle.as_mut().reset(tokio::time::Instant::now() + idle_timeout);
                match inbound {
                    Inbound::Text(text) => handler.handle_frame(&text),
                    Inbound::Binary(bytes) => match String::from_utf8(bytes) {
                        Ok(text) => handler.handle_frame(&text),
                        Err(err) => {
                            tracing::warn!(
                                len = err.as_bytes().len(),
                                "dropping non-UTF-8 binary frame"
                            );
                        }
                    },
                    Inbound::Heartbeat => tracing::trace!("channel heartbeat"),
                    Inbound::Close => {}
                }
            }
        }
    }
}

fn closed_requested() -> ConnectionState {
    ConnectionState::Closed {
        reason: CloseReason::Requested,
    }
}

fn handle_join(
    result: Result<Result<(), ChannelError>, tokio::task::JoinError>,
) -> Result<(), ChannelError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(ChannelError::Join(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::stream;

    /// Each connect pops one script entry; an exhausted script yields a
    /// connection that stays open.
    #[derive(Clone, Default)]
    struct Scripted {
        script: Arc<Mutex<VecDeque<Result<Vec<Inbound>, String>>>>,
        dials: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(entries: Vec<Result<Vec<Inbound>, String>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(entries.into())),
                dials: Arc::default(),
            }
        }

        fn dials(&self) -> usize {
            self.dials.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Connector for Scripted {
        async fn connect(&self, address: &str) -> Result<FrameStream, ChannelError> {
            self.dials.lock().unwrap().push(address.to_string());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(frames)) => Ok(stream::iter(frames.into_iter().map(Ok)).boxed()),
                Some(Err(reason)) => Err(ChannelError::Connect {
                    address: address.to_string(),
                    reason,
                }),
                None => Ok(stream::pending().boxed()),
            }
        }
    }

    fn policy(max_attempts: Option<u32>) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            max_attempts,
            connect_timeout_ms: 10_000,
            idle_timeout_ms: 3_600_000,
        }
    }

    /// Connector whose dial never completes.
    struct Hanging;

    #[async_trait]
    impl Connector for Hanging {
        async fn connect(&self, _address: &str) -> Result<FrameStream, ChannelError> {
            futures::future::pending().await
        }
    }

    /// Connects to a stream that only ever sends heartbeats.
    #[derive(Clone, Default)]
    struct Beating {
        dials: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl Connector for Beating {
        async fn connect(&self, _address: &str) -> Result<FrameStream, ChannelError> {
            *self.dials.lock().unwrap() += 1;
            Ok(stream::unfold((), |()| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Some((Ok(Inbound::Heartbeat), ()))
            })
            .boxed())
        }
    }

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl FrameHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |raw: &str| sink.lock().unwrap().push(raw.to_string()))
    }

    async fn wait_for(
        states: &mut watch::Receiver<ConnectionState>,
        pred: impl Fn(&ConnectionState) -> bool,
    ) -> ConnectionState {
        states.wait_for(|s| pred(s)).await.expect("state").clone()
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn frames_delivered_in_order_and_binary_decoded() {
        let connector = Scripted::new(vec![Ok(vec![
            Inbound::Text("one".into()),
            Inbound::Binary(b"two".to_vec()),
            Inbound::Binary(vec![0xff, 0xfe]),
            Inbound::Text("three".into()),
        ])]);
        let (seen, handler) = collector();
        let handle = ChannelManager::new(connector.clone(), "ws://push", policy(None)).spawn(handler);
        let mut states = handle.states();

        // First stream ends, the channel reconnects to a quiet stream.
        wait_for(&mut states, |_| connector.dials() == 2).await;
        wait_for(&mut states, ConnectionState::is_connected).await;

        assert_eq!(*seen.lock().unwrap(), vec!["one", "two", "three"]);
        handle.close().await.expect("close");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn reconnects_after_failures_and_resets_on_success() {
        let connector = Scripted::new(vec![
            Err("refused".into()),
            Err("refused".into()),
            Ok(vec![Inbound::Text("hello".into()), Inbound::Close]),
            Err("refused".into()),
        ]);
        let (_, handler) = collector();
        let handle =
            ChannelManager::new(connector.clone(), "ws://push", policy(Some(3))).spawn(handler);
        let mut states = handle.states();

        // Two failures, one connection that delivers a frame, one failure,
        // then the open stream. The delivered frame resets the count, so a
        // budget of 3 is never hit.
        wait_for(&mut states, |_| connector.dials() == 5).await;
        let state = wait_for(&mut states, ConnectionState::is_connected).await;
        assert_eq!(state, ConnectionState::Connected);

        handle.close().await.expect("close");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn gives_up_when_attempt_budget_is_spent() {
        let connector = Scripted::new(vec![
            Err("refused".into()),
            Err("refused".into()),
            Err("dns".into()),
        ]);
        let (_, handler) = collector();
        let mut handle =
            ChannelManager::new(connector.clone(), "ws://push", policy(Some(3))).spawn(handler);

        let err = handle.finished().await.expect_err("gave up");
        match err {
            ChannelError::GaveUp { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("dns"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            handle.state(),
            ConnectionState::Closed {
                reason: CloseReason::GaveUp { attempts: 3, .. }
            }
        ));
        assert_eq!(connector.dials(), 3);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn accept_then_close_still_spends_the_budget() {
        let connector = Scripted::new(vec![
            Ok(vec![Inbound::Close]),
            Ok(vec![Inbound::Close]),
            Ok(Vec::new()),
        ]);
        let (_, handler) = collector();
        let mut handle =
            ChannelManager::new(connector.clone(), "ws://push", policy(Some(3))).spawn(handler);

        let err = handle.finished().await.expect_err("gave up");
        match err {
            ChannelError::GaveUp { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "stream ended");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(connector.dials(), 3);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn hung_dial_times_out_and_counts_as_failure() {
        let mut handle = ChannelManager::new(
            Hanging,
            "ws://push",
            ReconnectConfig {
                connect_timeout_ms: 1_000,
                ..policy(Some(2))
            },
        )
        .spawn(|_: &str| {});

        let err = tokio::time::timeout(Duration::from_secs(60), handle.finished())
            .await
            .expect("manager must not hang")
            .expect_err("gave up");
        match err {
            ChannelError::GaveUp { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("timed out after 1000ms"), "{last_error}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn silent_connection_is_dropped_and_redialed() {
        let connector = Scripted::default();
        let handle = ChannelManager::new(
            connector.clone(),
            "ws://push",
            ReconnectConfig {
                idle_timeout_ms: 5_000,
                ..policy(None)
            },
        )
        .spawn(|_: &str| {});
        let mut states = handle.states();

        wait_for(&mut states, ConnectionState::is_connected).await;
        let state = wait_for(&mut states, |s| {
            matches!(s, ConnectionState::Reconnecting { .. })
        })
        .await;
        assert!(
            matches!(state, ConnectionState::Reconnecting { attempt: 2, .. }),
            "{state}"
        );
        wait_for(&mut states, |_| connector.dials() == 2).await;

        handle.close().await.expect("close");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn heartbeats_keep_a_quiet_connection_alive() {
        let connector = Beating::default();
        let (seen, handler) = collector();
        let handle = ChannelManager::new(
            connector.clone(),
            "ws://push",
            ReconnectConfig {
                idle_timeout_ms: 5_000,
                ..policy(None)
            },
        )
        .spawn(handler);

        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(*connector.dials.lock().unwrap(), 1);
        assert!(seen.lock().unwrap().is_empty());
        handle.close().await.expect("close");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn close_while_connected_is_requested() {
        let connector = Scripted::default();
        let (_, handler) = collector();
        let handle = ChannelManager::new(connector, "ws://push", policy(None)).spawn(handler);
        let mut states = handle.states();
        wait_for(&mut states, ConnectionState::is_connected).await;

        handle.close().await.expect("close");
        assert_eq!(
            *states.borrow(),
            ConnectionState::Closed {
                reason: CloseReason::Requested
            }
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn close_during_backoff_stops_dialing() {
        let connector = Scripted::new(vec![Err("refused".into())]);
        let (_, handler) = collector();
        let handle = ChannelManager::new(
            connector.clone(),
            "ws://push",
            ReconnectConfig {
                initial_delay_ms: 60_000,
                max_delay_ms: 60_000,
                multiplier: 1.0,
                ..policy(None)
            },
        )
        .spawn(handler);
        let mut states = handle.states();
        wait_for(&mut states, |s| {
            matches!(s, ConnectionState::Reconnecting { .. })
        })
        .await;

        handle.close().await.expect("close");
        assert_eq!(connector.dials(), 1);
    }

    #[test]
    fn state_display_is_readable() {
        let state = ConnectionState::Reconnecting {
            attempt: 2,
            delay: Duration::from_millis(250),
        };
        assert_eq!(state.to_string(), "reconnecting in 250ms (attempt 2)");
    }
}
