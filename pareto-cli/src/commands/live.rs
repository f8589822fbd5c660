//! `pareto live`: follow pushed sprint updates until ctrl-c.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;

use pareto_core::ParticipantId;
use pareto_live::{watch_blocking, ConnectionState, SessionEvent};
use pareto_sync::Notice;

use super::load_config;
use super::sprints::print_table;

#[derive(Args, Debug)]
pub struct LiveArgs {
    /// Mentee whose sprints to follow.
    pub mentee: String,

    /// One JSON object per line instead of tables.
    #[arg(long)]
    pub json: bool,
}

impl LiveArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let mentee = ParticipantId::from(self.mentee.as_str());
        let json = self.json;
        let shown = mentee.clone();

        watch_blocking(&config, mentee, |event| {
            if json {
                print_json_event(&event);
            } else {
                print_event(&shown, &event);
            }
        })
        .context("live session failed")
    }
}

fn print_event(mentee: &ParticipantId, event: &SessionEvent) {
    match event {
        SessionEvent::Started { sprints, address } => {
            print_table(mentee, sprints);
            match address {
                Some(address) => println!("{} {}", "listening on".bright_black(), address),
                None => println!("{}", "live updates are off".yellow()),
            }
        }
        SessionEvent::Updated(sprints) => {
            println!("{}", "sprints updated".green().bold());
            print_table(mentee, sprints);
        }
        SessionEvent::State(state) => {
            let label = state.to_string();
            let label = match state {
                ConnectionState::Connected => label.green(),
                ConnectionState::Closed { .. } => label.red(),
                _ => label.yellow(),
            };
            println!("{} {}", "channel".bright_black(), label);
        }
        SessionEvent::Notice(Notice::Status(message)) => println!("{} {}", "ℹ".cyan(), message),
        SessionEvent::Notice(Notice::Error(message)) => {
            eprintln!("{} {}", "✗".red(), message)
        }
    }
}

fn print_json_event(event: &SessionEvent) {
    let payload = match event {
        SessionEvent::Started { sprints, address } => json!({
            "event": "started",
            "address": address,
            "sprints": sprints.as_slice(),
        }),
        SessionEvent::Updated(sprints) => json!({
            "event": "updated",
            "sprints": sprints.as_slice(),
        }),
        SessionEvent::State(state) => json!({
            "event": "state",
            "state": state.to_string(),
        }),
        SessionEvent::Notice(Notice::Status(message)) => json!({
            "event": "status",
            "message": message,
        }),
        SessionEvent::Notice(Notice::Error(message)) => json!({
            "event": "error",
            "message": message,
        }),
    };
    println!("{payload}");
}
