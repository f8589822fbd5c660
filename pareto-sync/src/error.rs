//! Error types for pareto-sync.

use thiserror::Error;

/// Reasons an inbound payload is rejected before it reaches the store.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Payload is not JSON at all.
    #[error("frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// Payload is JSON but not an object (array, string, number, …).
    #[error("frame must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// A status frame whose `message` is not a string.
    #[error("status frame 'message' must be a string")]
    BadMessage,

    /// A sprint frame without a usable identifier.
    #[error("sprint frame has no non-empty string 'id'")]
    MissingId,

    /// A sprint frame whose fields do not match the sprint record.
    #[error("sprint frame {id} is malformed: {source}")]
    BadSprint {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
