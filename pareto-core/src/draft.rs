//! Building the payload for "create sprint".
//!
//! A [`SprintDraft`] collects the choices a creator makes (template, players,
//! start date) and turns them into a complete [`Sprint`] record:
//!
//! - every chosen player gets a team, and the creator is appended last;
//! - each team starts with zero score, one blank planning and review section
//!   per [`Category`], and [`SPRINT_DAYS`] copies of the template's missions;
//! - the sprint ends [`SPRINT_LENGTH_MS`] after it starts.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::SprintError;
use crate::types::{
    Category, Mission, MissionDay, Participant, ParticipantId, Points, Section, Sprint,
    SprintId, SprintTemplate, Team, TemplateMission,
};

/// Number of mission days every team receives.
pub const SPRINT_DAYS: usize = 5;

/// Sprint length in milliseconds (five days).
pub const SPRINT_LENGTH_MS: i64 = 432_000_000;

/// How far ahead a sprint may be scheduled.
pub const MAX_DAYS_AHEAD: i64 = 90;

/// A sprint being put together by its creator.
#[derive(Debug, Clone)]
pub struct SprintDraft {
    creator: Participant,
    template: Option<SprintTemplate>,
    players: Vec<Participant>,
    start: Option<DateTime<Utc>>,
}

impl SprintDraft {
    pub fn new(creator: Participant) -> Self {
        Self {
            creator,
            template: None,
            players: Vec::new(),
            start: None,
        }
    }

    pub fn creator(&self) -> &Participant {
        &self.creator
    }

    pub fn players(&self) -> &[Participant] {
        &self.players
    }

    pub fn template(&self) -> Option<&SprintTemplate> {
        self.template.as_ref()
    }

    pub fn choose_template(&mut self, template: SprintTemplate) {
        self.template = Some(template);
    }

    pub fn clear_template(&mut self) {
        self.template = None;
    }

    pub fn set_start(&mut self, start: DateTime<Utc>) {
        self.start = Some(start);
    }

    /// Add a competing player.
    pub fn add_player(&mut self, player: Participant) -> Result<(), SprintError> {
        if player.id == self.creator.id {
            return Err(SprintError::CreatorAsPlayer(player.id));
        }
        if self.players.iter().any(|p| p.id == player.id) {
            return Err(SprintError::DuplicatePlayer(player.id));
        }
        self.players.push(player);
        Ok(())
    }

    pub fn remove_player(&mut self, id: &ParticipantId) -> Result<Participant, SprintError> {
        let idx = self
            .players
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| SprintError::UnknownPlayer(id.clone()))?;
        Ok(self.players.remove(idx))
    }

    /// Users that can still be picked: everyone except the creator and the
    /// players already chosen.
    pub fn selectable<'a>(&self, users: &'a [Participant]) -> Vec<&'a Participant> {
        users
            .iter()
            .filter(|u| u.id != self.creator.id)
            .filter(|u| !self.players.iter().any(|p| p.id == u.id))
            .collect()
    }

    /// Check the draft against `now`, collecting every failure.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), SprintError> {
        let mut messages = Vec::new();

        match self.start {
            None => messages.push("choose a start date".to_string()),
            Some(start) => {
                if let Err(message) = start_message(start, now) {
                    messages.push(message);
                }
            }
        }

        if self.template.is_none() {
            messages.push("choose a sprint template".to_string());
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(SprintError::Invalid(messages))
        }
    }

    /// Validate and assemble the sprint payload.
    pub fn build(&self, now: DateTime<Utc>) -> Result<Sprint, SprintError> {
        self.validate(now)?;
        let (Some(template), Some(start)) = (self.template.as_ref(), self.start) else {
            return Err(SprintError::Invalid(vec!["draft is incomplete".to_string()]));
        };

        let now_ms = now.timestamp_millis();
        let day = MissionDay {
            daily_score: Points::default(),
            daily_completion: 0.0,
            missions: template
                .missions
                .iter()
                .map(|m| mission_from_template(m, now_ms))
                .collect(),
        };

        let teams = self
            .players
            .iter()
            .chain(std::iter::once(&self.creator))
            .map(|p| blank_team(p, &day))
            .collect();

        Ok(Sprint {
            id: SprintId(Uuid::new_v4().to_string()),
            athlete_id: Some(self.creator.id.clone()),
            coach_id: self.creator.mentor.clone(),
            start_date: Some(start.into()),
            end_date: Some((start + Duration::milliseconds(SPRINT_LENGTH_MS)).into()),
            events: Vec::new(),
            study_sessions: Vec::new(),
            created_at: Some(now_ms),
            updated_at: Some(now_ms),
            started: Some(true),
            teams,
            extra: Map::new(),
        })
    }
}

/// Check a start date on its own, before any other choice is made.
pub fn check_start(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), SprintError> {
    start_message(start, now).map_err(|message| SprintError::Invalid(vec![message]))
}

/// Dates are compared in UTC: from today's midnight up to [`MAX_DAYS_AHEAD`]
/// days after `now`.
fn start_message(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), String> {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let latest = now + Duration::days(MAX_DAYS_AHEAD);
    if start < today || start > latest {
        return Err(format!(
            "start date must be between today and {MAX_DAYS_AHEAD} days from now"
        ));
    }
    Ok(())
}

/// The template's summaries become the mission description and also travel
/// under their own keys, which the gateway keeps on every mission.
fn mission_from_template(template: &TemplateMission, now_ms: i64) -> Mission {
    let mut extra = template.extra.clone();
    if let Some(summary) = &template.summary {
        extra.insert("summary".to_string(), Value::String(summary.clone()));
    }
    if let Some(summary) = &template.es_summary {
        extra.insert("esSummary".to_string(), Value::String(summary.clone()));
    }
    Mission {
        title: template.title.clone(),
        es_title: template.es_title.clone(),
        description: template.summary.clone(),
        es_description: template.es_summary.clone(),
        xp: template.xp.clone(),
        completed: false,
        confirmed: false,
        completed_at: Some(now_ms),
        proof: Vec::new(),
        questions: Vec::new(),
        key: String::new(),
        img: String::new(),
        extra,
    }
}

fn blank_team(participant: &Participant, day: &MissionDay) -> Team {
    Team {
        id: participant.id.clone(),
        first_name: participant.first_name.clone(),
        last_name: participant.last_name.clone(),
        email: participant.email.clone(),
        phone: participant.phone.clone(),
        github: participant.github.clone(),
        score: Points::default(),
        percentage: 0.0,
        planning: Category::ALL.into_iter().map(Section::blank).collect(),
        review: Category::ALL.into_iter().map(Section::blank).collect(),
        missions: vec![day.clone(); SPRINT_DAYS],
        extra: Map::new(),
    }
}
