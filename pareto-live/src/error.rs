use thiserror::Error;

/// Failures talking to the REST gateway.
#[derive(Debug, Error)]
pub enum ApiError {
    /// DNS, TLS, connection refused, timeout.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The gateway answered with a non-success status.
    #[error("{url} returned HTTP {code}: {body}")]
    Status { url: String, code: u16, body: String },

    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("blocking request task failed: {0}")]
    Join(String),
}

impl ApiError {
    pub(crate) fn from_ureq(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => ApiError::Status {
                url: url.to_string(),
                code,
                body: response
                    .into_string()
                    .unwrap_or_else(|e| format!("<unreadable body: {e}>")),
            },
            ureq::Error::Transport(transport) => ApiError::Transport {
                url: url.to_string(),
                reason: transport.to_string(),
            },
        }
    }
}

/// Failures of the push channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid channel address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("could not connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("connecting to {address} timed out after {after_ms}ms")]
    Timeout { address: String, after_ms: u64 },

    #[error("channel transport error: {0}")]
    Transport(String),

    #[error("gave up after {attempts} failed connection attempts: {last_error}")]
    GaveUp { attempts: u32, last_error: String },

    #[error("channel task join failure: {0}")]
    Join(String),
}

/// Error surface for the session and runtime.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
