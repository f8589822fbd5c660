//! `pareto keys`: show which address a live session would dial.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};

use pareto_core::{ParticipantId, Sprint};
use pareto_live::{HttpSprintApi, SprintApi};
use pareto_sync::Subscription;

use super::load_config;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["mentee", "from_file"])))]
pub struct KeysArgs {
    /// Fetch the mentee's sprints from the gateway.
    pub mentee: Option<String>,

    /// Read a JSON array of sprint records instead of calling the gateway.
    #[arg(long)]
    pub from_file: Option<PathBuf>,

    /// Print only the `key0=…&key1=…` query.
    #[arg(long)]
    pub query_only: bool,
}

impl KeysArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let sprints = match (&self.from_file, &self.mentee) {
            (Some(path), _) => read_sprints(path)?,
            (None, Some(mentee)) => {
                let mentee = ParticipantId::from(mentee.as_str());
                HttpSprintApi::new(&config)
                    .fetch_mentee_sprints(&mentee)
                    .with_context(|| format!("failed to fetch sprints for mentee '{mentee}'"))?
            }
            (None, None) => anyhow::bail!("pass a mentee id or --from-file"),
        };

        let subscription = Subscription::from_sprints(&sprints);
        if self.query_only {
            println!("{}", subscription.query_string());
        } else {
            println!("{}", subscription.address(&config.wss_endpoint));
        }
        Ok(())
    }
}

fn read_sprints(path: &Path) -> Result<Vec<Sprint>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of sprints", path.display()))
}
