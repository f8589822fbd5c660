//! The push transport seam. Production uses a WebSocket; tests plug in
//! scripted connectors.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use futures::{Sink, SinkExt, Stream};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use pareto_core::ReconnectConfig;

use crate::error::ChannelError;

/// One inbound unit from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
    /// Proof the peer is alive (ping or pong). Never handed to frame handlers.
    Heartbeat,
    /// Peer sent a close frame.
    Close,
}

pub type FrameStream = BoxStream<'static, Result<Inbound, ChannelError>>;

/// Opens one connection. The stream ending, yielding an error, or yielding
/// [`Inbound::Close`] all count as a disconnect.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, address: &str) -> Result<FrameStream, ChannelError>;
}

/// WebSocket connector. Pings the server every `ping_interval` so a
/// half-open socket surfaces as silence on the frame stream.
#[derive(Debug, Clone)]
pub struct WsConnector {
    ping_interval: Duration,
}

impl WsConnector {
    pub fn new(policy: &ReconnectConfig) -> Self {
        Self {
            ping_interval: policy.ping_interval(),
        }
    }
}

/// Accepts `ws://` and `wss://` addresses only.
pub fn check_address(address: &str) -> Result<(), ChannelError> {
    let lower = address.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("wss://")
        .or_else(|| lower.strip_prefix("ws://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        Some(_) => Err(ChannelError::InvalidAddress {
            address: address.to_string(),
            reason: "missing host".to_string(),
        }),
        None => Err(ChannelError::InvalidAddress {
            address: address.to_string(),
            reason: "scheme must be ws:// or wss://".to_string(),
        }),
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, address: &str) -> Result<FrameStream, ChannelError> {
        check_address(address)?;
        let (socket, response) = tokio_tungstenite::connect_async(address)
            .await
            .map_err(|e| ChannelError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(status = %response.status(), "websocket handshake complete");

        Ok(frame_stream(socket, self.ping_interval))
    }
}

fn frame_stream<S>(socket: S, ping_interval: Duration) -> FrameStream
where
    S: Stream<Item = Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Unpin
        + Send
        + 'static,
{
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold((socket, ping), |(mut socket, mut ping)| async move {
        loop {
            tokio::select! {
                _ = ping.tick() => {
                    if let Err(err) = socket.send(Message::Ping(Vec::new())).await {
                        let err = ChannelError::Transport(format!("keepalive ping failed: {err}"));
                        return Some((Err(err), (socket, ping)));
                    }
                }
                message = socket.next() => {
                    let item = match message? {
                        Ok(message) => match inbound(message) {
                            Some(item) => Ok(item),
                            None => continue,
                        },
                        Err(err) => Err(ChannelError::Transport(err.to_string())),
                    };
                    return Some((item, (socket, ping)));
                }
            }
        }
    })
    .boxed()
}

fn inbound(message: Message) -> Option<Inbound> {
    match message {
        Message::Text(text) => Some(Inbound::Text(text)),
        Message::Binary(bytes) => Some(Inbound::Binary(bytes)),
        Message::Ping(_) | Message::Pong(_) => Some(Inbound::Heartbeat),
        Message::Close(frame) => {
            tracing::debug!(?frame, "server closed the channel");
            Some(Inbound::Close)
        }
        Message::Frame(_) => None,
    }
}
