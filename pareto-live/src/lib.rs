//! Live sprint channel: push connection, reconnect policy, REST collaborators
//! and the session that ties them to a [`pareto_sync::SprintStore`].

pub mod api;
pub mod backoff;
pub mod channel;
mod error;
mod runtime;
pub mod session;
pub mod transport;

pub use api::{HttpSprintApi, SprintApi};
pub use backoff::Backoff;
pub use channel::{ChannelHandle, ChannelManager, CloseReason, ConnectionState, FrameHandler};
pub use error::{ApiError, ChannelError, LiveError};
pub use runtime::{init_tracing, run, watch_blocking, SessionEvent};
pub use session::LiveSession;
pub use transport::{Connector, FrameStream, Inbound, WsConnector};
