//! REST collaborators of the sprint gateway.
//!
//! Calls are blocking (`ureq`); async callers go through
//! `tokio::task::spawn_blocking`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use pareto_core::{Config, Participant, ParticipantId, Sprint, SprintTemplate};

use crate::error::ApiError;

pub trait SprintApi: Send + Sync + 'static {
    /// Every sprint the mentee takes part in.
    fn fetch_mentee_sprints(&self, mentee: &ParticipantId) -> Result<Vec<Sprint>, ApiError>;

    fn create_sprint(&self, sprint: &Sprint) -> Result<(), ApiError>;

    fn fetch_templates(&self) -> Result<Vec<SprintTemplate>, ApiError>;

    fn fetch_users(&self) -> Result<Vec<Participant>, ApiError>;
}

pub struct HttpSprintApi {
    agent: ureq::Agent,
    base: String,
    token: Option<String>,
}

impl HttpSprintApi {
    pub fn new(config: &Config) -> Self {
        Self::with_timeout(
            &config.api_endpoint,
            config.token.clone(),
            config.request_timeout(),
        )
    }

    pub fn with_timeout(base: &str, token: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base: base.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let request = self
            .agent
            .request(method, url)
            .set("Accept", "application/json");
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let response = self
            .request("GET", &url)
            .call()
            .map_err(|e| ApiError::from_ureq(&url, e))?;
        response
            .into_json()
            .map_err(|source| ApiError::Decode { url, source })
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        self.request("POST", &url)
            .send_json(body)
            .map_err(|e| ApiError::from_ureq(&url, e))?;
        Ok(())
    }
}

impl SprintApi for HttpSprintApi {
    fn fetch_mentee_sprints(&self, mentee: &ParticipantId) -> Result<Vec<Sprint>, ApiError> {
        self.get_json(&format!("sprints/mentee/{mentee}"))
    }

    fn create_sprint(&self, sprint: &Sprint) -> Result<(), ApiError> {
        self.post_json("sprints", sprint)
    }

    fn fetch_templates(&self) -> Result<Vec<SprintTemplate>, ApiError> {
        self.get_json("templates")
    }

    fn fetch_users(&self) -> Result<Vec<Participant>, ApiError> {
        self.get_json("users")
    }
}
