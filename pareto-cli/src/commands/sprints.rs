//! `pareto sprints`: one-shot listing from the gateway.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use pareto_core::{ParticipantId, Sprint};
use pareto_live::{HttpSprintApi, SprintApi};

use super::{date_label, leader, load_config};

#[derive(Args, Debug)]
pub struct SprintsArgs {
    /// Mentee whose sprints to list.
    pub mentee: String,

    /// Emit the raw sprint records as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
pub(crate) struct SprintRow {
    #[tabled(rename = "sprint")]
    id: String,
    #[tabled(rename = "start")]
    start: String,
    #[tabled(rename = "end")]
    end: String,
    #[tabled(rename = "teams")]
    teams: usize,
    #[tabled(rename = "leader")]
    leader: String,
}

impl SprintRow {
    pub(crate) fn from_sprint(sprint: &Sprint) -> Self {
        Self {
            id: sprint.id.to_string(),
            start: date_label(sprint.start_date.as_ref()),
            end: date_label(sprint.end_date.as_ref()),
            teams: sprint.teams.len(),
            leader: leader(sprint),
        }
    }
}

impl SprintsArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let mentee = ParticipantId::from(self.mentee.as_str());
        let api = HttpSprintApi::new(&config);

        let sprints = api
            .fetch_mentee_sprints(&mentee)
            .with_context(|| format!("failed to fetch sprints for mentee '{mentee}'"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&sprints).context("failed to serialize sprints")?
            );
            return Ok(());
        }

        print_table(&mentee, &sprints);
        Ok(())
    }
}

pub(crate) fn print_table(mentee: &ParticipantId, sprints: &[Sprint]) {
    println!(
        "{} | {} sprints",
        format!("mentee {mentee}").bold(),
        sprints.len()
    );
    if sprints.is_empty() {
        println!("No sprints found.");
        return;
    }
    let rows: Vec<SprintRow> = sprints.iter().map(SprintRow::from_sprint).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
