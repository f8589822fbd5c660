//! `pareto create`: assemble a sprint from a template and submit it.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::Args;
use colored::Colorize;

use pareto_core::draft::check_start;
use pareto_core::{Participant, ParticipantId, SprintDraft, SprintTemplate};
use pareto_live::{HttpSprintApi, SprintApi};

use super::load_config;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Creator of the sprint; becomes the athlete and the last team.
    #[arg(long)]
    pub athlete: String,

    /// Coach to record instead of the athlete's mentor.
    #[arg(long)]
    pub coach: Option<String>,

    /// Title of the template whose missions every team receives.
    #[arg(long)]
    pub template: String,

    /// Competing player; repeat for several.
    #[arg(long = "player")]
    pub players: Vec<String>,

    /// First day of the sprint (UTC).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: NaiveDate,

    /// Print the sprint instead of submitting it.
    #[arg(long)]
    pub dry_run: bool,
}

impl CreateArgs {
    pub fn run(self) -> Result<()> {
        let now = Utc::now();
        let start = self.start.and_time(NaiveTime::MIN).and_utc();
        // Fail fast on a bad date before touching the network.
        check_start(start, now).context("invalid --start")?;

        let config = load_config()?;
        let api = HttpSprintApi::new(&config);

        let users = api.fetch_users().context("failed to fetch users")?;
        let mut creator = find_user(&users, &self.athlete)
            .with_context(|| format!("unknown athlete '{}'", self.athlete))?;
        if let Some(coach) = &self.coach {
            creator.mentor = Some(ParticipantId::from(coach.as_str()));
        }

        let templates = api.fetch_templates().context("failed to fetch templates")?;
        let template = pick_template(templates, &self.template)?;

        let mut draft = SprintDraft::new(creator);
        draft.choose_template(template);
        draft.set_start(start);
        for id in &self.players {
            let player = find_user(&users, id).with_context(|| format!("unknown player '{id}'"))?;
            draft
                .add_player(player)
                .with_context(|| format!("cannot add player '{id}'"))?;
        }

        let sprint = draft.build(now).context("sprint is not ready")?;

        if self.dry_run {
            println!(
                "{}",
                serde_json::to_string_pretty(&sprint).context("failed to serialize sprint")?
            );
            return Ok(());
        }

        api.create_sprint(&sprint)
            .with_context(|| format!("failed to create sprint {}", sprint.id))?;
        println!(
            "{} sprint {} with {} teams",
            "created".green().bold(),
            sprint.id,
            sprint.teams.len()
        );
        Ok(())
    }
}

fn find_user(users: &[Participant], id: &str) -> Option<Participant> {
    let id = ParticipantId::from(id);
    users.iter().find(|u| u.id == id).cloned()
}

fn pick_template(templates: Vec<SprintTemplate>, title: &str) -> Result<SprintTemplate> {
    let available: Vec<String> = templates.iter().map(|t| t.title.clone()).collect();
    match templates
        .into_iter()
        .find(|t| t.title.eq_ignore_ascii_case(title))
    {
        Some(template) => Ok(template),
        None => bail!(
            "no template titled '{title}'; available: {}",
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        ),
    }
}
