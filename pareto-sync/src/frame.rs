//! Inbound frame decoding.
//!
//! The channel carries two payload shapes, told apart only by the presence of
//! a `message` key:
//!
//! - `{"message": "..."}`: a status notice, no sprint payload;
//! - a full sprint record: a whole-object replacement.
//!
//! [`Frame::decode`] turns the raw text into a tagged [`Frame`] once, at the
//! channel boundary. Nothing downstream inspects raw JSON.

use serde_json::Value;

use pareto_core::types::Sprint;

use crate::error::FrameError;

/// One decoded channel payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Human-readable notice; never changes sprint state.
    Status { message: String },
    /// Full replacement of one sprint record.
    SprintUpdate(Box<Sprint>),
}

impl Frame {
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(raw).map_err(FrameError::Json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let Value::Object(mut fields) = value else {
            return Err(FrameError::NotAnObject(kind(&value)));
        };

        if let Some(message) = fields.remove("message") {
            return match message {
                Value::String(message) => Ok(Frame::Status { message }),
                _ => Err(FrameError::BadMessage),
            };
        }

        let id = match fields.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            _ => return Err(FrameError::MissingId),
        };

        serde_json::from_value(Value::Object(fields))
            .map(|sprint| Frame::SprintUpdate(Box::new(sprint)))
            .map_err(|source| FrameError::BadSprint { id, source })
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Status { .. } => "status",
            Frame::SprintUpdate(_) => "sprint_update",
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
