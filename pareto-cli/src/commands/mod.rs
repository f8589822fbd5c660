pub mod config;
pub mod create;
pub mod keys;
pub mod live;
pub mod sprints;

use std::path::PathBuf;

use anyhow::{Context, Result};

use pareto_core::{config as core_config, Config, Sprint, SprintDate};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Config file plus environment overrides, validated.
pub(crate) fn load_config() -> Result<Config> {
    let home = home()?;
    core_config::load_at(&home).with_context(|| {
        format!(
            "failed to load {}",
            core_config::config_path_at(&home).display()
        )
    })
}

/// Score of the best team, if any.
pub(crate) fn leader(sprint: &Sprint) -> String {
    sprint
        .teams
        .iter()
        .max_by(|a, b| a.score.as_f64().total_cmp(&b.score.as_f64()))
        .map(|t| format!("{} ({})", t.display_name(), t.score))
        .unwrap_or_else(|| "-".to_string())
}

/// Unrecognised dates are shown as the gateway sent them.
pub(crate) fn date_label(date: Option<&SprintDate>) -> String {
    match date {
        Some(SprintDate::At(d)) => d.format("%Y-%m-%d").to_string(),
        Some(SprintDate::Unparsed(serde_json::Value::String(raw))) => raw.clone(),
        Some(SprintDate::Unparsed(raw)) => raw.to_string(),
        None => "-".to_string(),
    }
}
