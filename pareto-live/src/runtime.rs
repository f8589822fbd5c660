use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use pareto_core::{Config, ParticipantId};
use pareto_sync::store::Snapshot;
use pareto_sync::Notice;

use crate::api::{HttpSprintApi, SprintApi};
use crate::channel::ConnectionState;
use crate::error::{ChannelError, LiveError};
use crate::session::LiveSession;
use crate::transport::{Connector, WsConnector};

const NOTICE_CAPACITY: usize = 64;

/// What a running session reports to its front end.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started {
        sprints: Snapshot,
        address: Option<String>,
    },
    Updated(Snapshot),
    State(ConnectionState),
    Notice(Notice),
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Run a live session against the configured endpoints and block the current
/// thread until ctrl-c.
pub fn watch_blocking<F>(config: &Config, mentee: ParticipantId, on_event: F) -> Result<(), LiveError>
where
    F: FnMut(SessionEvent),
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(
        Arc::new(HttpSprintApi::new(config)),
        WsConnector::new(&config.reconnect),
        config,
        mentee,
        ctrl_c(),
        on_event,
    ))
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, closing live session"),
        Err(err) => tracing::error!(error = %err, "ctrl-c handler failed, closing live session"),
    }
}

/// Drive one session until `stop` resolves, forwarding every change to
/// `on_event`.
pub async fn run<A, C, S, F>(
    api: Arc<A>,
    connector: C,
    config: &Config,
    mentee: ParticipantId,
    stop: S,
    mut on_event: F,
) -> Result<(), LiveError>
where
    A: SprintApi,
    C: Connector,
    S: Future<Output = ()>,
    F: FnMut(SessionEvent),
{
    let (notice_tx, mut notices) = broadcast::channel(NOTICE_CAPACITY);
    let session = LiveSession::start_with(api, connector, config, mentee, notice_tx).await;

    let mut view = session.subscribe();
    on_event(SessionEvent::Started {
        sprints: view.current(),
        address: session.address().map(str::to_string),
    });

    let mut states = session.states();
    if let Some(rx) = states.as_mut() {
        on_event(SessionEvent::State(rx.borrow_and_update().clone()));
    }

    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            Some(snapshot) = view.changed() => on_event(SessionEvent::Updated(snapshot)),
            notice = notices.recv() => match notice {
                Ok(notice) => on_event(SessionEvent::Notice(notice)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notice receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            next = next_state(&mut states) => match next {
                Some(state) => on_event(SessionEvent::State(state)),
                None => states = None,
            },
        }
    }

    match session.shutdown().await {
        // Already reported as a notice when it happened.
        Err(ChannelError::GaveUp { .. }) | Ok(()) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Next connection state; pends forever once there is no channel.
async fn next_state(
    states: &mut Option<watch::Receiver<ConnectionState>>,
) -> Option<ConnectionState> {
    match states {
        Some(rx) => {
            rx.changed().await.ok()?;
            Some(rx.borrow_and_update().clone())
        }
        None => std::future::pending().await,
    }
}
