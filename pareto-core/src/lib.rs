//! Pareto core library: sprint domain types, sprint drafts, configuration, errors.
//!
//! - [`types`]: newtypes and the sprint/team/mission records
//! - [`draft`]: building and validating a "create sprint" payload
//! - [`config`]: `~/.pareto/config.yaml` load / save / env overrides
//! - [`error`]: [`ConfigError`], [`SprintError`]

pub mod config;
pub mod draft;
pub mod error;
pub mod types;

pub use config::{Config, ReconnectConfig};
pub use draft::SprintDraft;
pub use error::{ConfigError, SprintError};
pub use types::{
    Category, Mission, MissionDay, Participant, ParticipantId, Points, Section, Sprint,
    SprintDate, SprintId, SprintTemplate, Team, TemplateMission,
};
