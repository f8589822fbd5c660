//! A live view of one mentee's sprints.
//!
//! The session fetches the initial collection over REST, derives the channel
//! subscription from it and hands the store to a [`Reconciler`] running
//! inside the channel task. Readers only ever see [`SprintView`]s.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use pareto_core::{Config, ParticipantId};
use pareto_sync::store::Snapshot;
use pareto_sync::{Notice, Reconciler, SprintStore, SprintView, Subscription};

use crate::api::{HttpSprintApi, SprintApi};
use crate::channel::{ChannelHandle, ChannelManager, CloseReason, ConnectionState};
use crate::error::{ApiError, ChannelError};
use crate::transport::{check_address, Connector, WsConnector};

const NOTICE_CAPACITY: usize = 64;

enum Writer {
    /// No channel: the session itself keeps the store alive.
    Idle(SprintStore),
    /// The reconciler inside the channel task owns the store.
    Channel(ChannelHandle),
}

pub struct LiveSession {
    view: SprintView,
    subscription: Subscription,
    address: Option<String>,
    degraded: Option<String>,
    notices: broadcast::Sender<Notice>,
    writer: Writer,
}

impl LiveSession {
    /// Start against the configured gateway and push endpoint.
    pub async fn connect(config: &Config, mentee: ParticipantId) -> Self {
        let connector = WsConnector::new(&config.reconnect);
        Self::start(Arc::new(HttpSprintApi::new(config)), connector, config, mentee).await
    }

    pub async fn start<A, C>(api: Arc<A>, connector: C, config: &Config, mentee: ParticipantId) -> Self
    where
        A: SprintApi,
        C: Connector,
    {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self::start_with(api, connector, config, mentee, notices).await
    }

    /// Like [`LiveSession::start`], publishing notices on a sender the caller
    /// already subscribed to, so nothing raised during start-up is missed.
    pub async fn start_with<A, C>(
        api: Arc<A>,
        connector: C,
        config: &Config,
        mentee: ParticipantId,
        notices: broadcast::Sender<Notice>,
    ) -> Self
    where
        A: SprintApi,
        C: Connector,
    {
        let fetched = {
            let mentee = mentee.clone();
            tokio::task::spawn_blocking(move || api.fetch_mentee_sprints(&mentee))
                .await
                .map_err(|err| ApiError::Join(err.to_string()))
                .and_then(|result| result)
        };

        let sprints = match fetched {
            Ok(sprints) => sprints,
            Err(err) => {
                return Self::start_degraded(notices, format!("could not load sprints: {err}"));
            }
        };

        let store = SprintStore::from_sprints(sprints);
        let view = store.subscribe();
        let subscription = Subscription::from_sprints(&store.snapshot());
        tracing::info!(%mentee, sprints = store.len(), "sprints loaded");

        if subscription.is_empty() {
            tracing::info!(%mentee, "no sprints; live channel not opened");
            return Self {
                view,
                subscription,
                address: None,
                degraded: None,
                notices,
                writer: Writer::Idle(store),
            };
        }

        let address = subscription.address(&config.wss_endpoint);
        if let Err(err) = check_address(&address) {
            let reason = err.to_string();
            tracing::warn!(error = %reason, "live channel not opened");
            let _ = notices.send(Notice::Error(reason.clone()));
            return Self {
                view,
                subscription,
                address: None,
                degraded: Some(reason),
                notices,
                writer: Writer::Idle(store),
            };
        }

        let reconciler = Reconciler::new(store, notices.clone());
        let handle = ChannelManager::new(connector, address.clone(), config.reconnect.clone())
            .spawn(reconciler);
        report_give_up(handle.states(), notices.clone());

        Self {
            view,
            subscription,
            address: Some(address),
            degraded: None,
            notices,
            writer: Writer::Channel(handle),
        }
    }

    fn start_degraded(notices: broadcast::Sender<Notice>, reason: String) -> Self {
        tracing::warn!(error = %reason, "starting without live updates");
        let _ = notices.send(Notice::Error(reason.clone()));
        let store = SprintStore::new();
        Self {
            view: store.subscribe(),
            subscription: Subscription::default(),
            address: None,
            degraded: Some(reason),
            notices,
            writer: Writer::Idle(store),
        }
    }

    pub fn subscribe(&self) -> SprintView {
        self.view.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.view.clone().current()
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Push address in use, if a channel was opened.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Why the session runs without a channel, when that is due to a failure.
    pub fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        match &self.writer {
            Writer::Idle(_) => ConnectionState::Disconnected,
            Writer::Channel(handle) => handle.state(),
        }
    }

    pub fn states(&self) -> Option<watch::Receiver<ConnectionState>> {
        match &self.writer {
            Writer::Idle(_) => None,
            Writer::Channel(handle) => Some(handle.states()),
        }
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Close the channel, if any. Views keep the last published collection.
    pub async fn shutdown(self) -> Result<(), ChannelError> {
        match self.writer {
            Writer::Idle(_) => Ok(()),
            Writer::Channel(handle) => handle.close().await,
        }
    }
}

/// Turn the channel giving up into a user-visible notice.
fn report_give_up(mut states: watch::Receiver<ConnectionState>, notices: broadcast::Sender<Notice>) {
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            if let ConnectionState::Closed {
                reason: reason @ CloseReason::GaveUp { .. },
            } = state
            {
                let _ = notices.send(Notice::Error(format!("live updates stopped: {reason}")));
                break;
            }
        }
    });
}
