//! Error types for pareto-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ParticipantId;

/// All errors that can arise from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, read-only filesystem, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.pareto/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A loaded or overridden value is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while assembling a sprint draft.
#[derive(Debug, Error, PartialEq)]
pub enum SprintError {
    /// One or more form checks failed; every message is reported.
    #[error("sprint is not valid: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// The creator always competes and cannot also be picked as a player.
    #[error("participant {0} is the sprint creator and is already on a team")]
    CreatorAsPlayer(ParticipantId),

    #[error("participant {0} has already been chosen")]
    DuplicatePlayer(ParticipantId),

    #[error("participant {0} is not a chosen player")]
    UnknownPlayer(ParticipantId),
}
