//! Domain types for sprints as the REST gateway and push channel carry them.
//!
//! Wire names are camelCase. Every record keeps the fields it does not model
//! in an `extra` map so a whole-record replacement never drops server data.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque identifier of a sprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SprintId(pub String);

impl fmt::Display for SprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SprintId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SprintId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of a user taking part in a sprint.
///
/// The gateway hands out numeric ids for some accounts and string ids for
/// others; both shapes survive a round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParticipantId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantId::Number(n) => n.fmt(f),
            ParticipantId::Text(s) => s.fmt(f),
        }
    }
}

impl From<i64> for ParticipantId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        s.parse::<i64>()
            .map(Self::Number)
            .unwrap_or_else(|_| Self::Text(s.to_owned()))
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Fixed planning/review categories every team fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Personal,
    Professional,
    Health,
    Relationship,
    Financial,
    Mental,
    Social,
}

impl Category {
    /// Every category in the order teams present them.
    pub const ALL: [Category; 7] = [
        Category::Personal,
        Category::Professional,
        Category::Health,
        Category::Relationship,
        Category::Financial,
        Category::Mental,
        Category::Social,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Professional => "professional",
            Category::Health => "health",
            Category::Relationship => "relationship",
            Category::Financial => "financial",
            Category::Mental => "mental",
            Category::Social => "social",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Personal => "Personal",
            Category::Professional => "Professional",
            Category::Health => "Health & Fitness",
            Category::Relationship => "Relationship",
            Category::Financial => "Financial",
            Category::Mental => "Mental",
            Category::Social => "Social",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One planning or review entry of a team, keyed by category code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

impl Section {
    /// An empty section for `category`.
    pub fn blank(category: Category) -> Self {
        Self {
            name: category.display_name().to_string(),
            code: category.code().to_string(),
            content: String::new(),
        }
    }

    pub fn category(&self) -> Option<Category> {
        Category::from_code(&self.code)
    }
}

/// A mission assigned within a sprint day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_description: Option<String>,
    #[serde(default)]
    pub xp: Points,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub proof: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub questions: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub img: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The missions of one sprint day together with that day's tallies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MissionDay {
    #[serde(default)]
    pub daily_score: Points,
    #[serde(default, deserialize_with = "null_as_default")]
    pub daily_completion: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missions: Vec<Mission>,
}

/// A participant's team inside a sprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: ParticipantId,
    #[serde(rename = "fName", default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(rename = "lName", default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default)]
    pub score: Points,
    #[serde(default, deserialize_with = "null_as_default")]
    pub percentage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub planning: Vec<Section>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub review: Vec<Section>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missions: Vec<MissionDay>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Team {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn planning_for(&self, category: Category) -> Option<&Section> {
        self.planning.iter().find(|s| s.code == category.code())
    }

    pub fn review_for(&self, category: Category) -> Option<&Section> {
        self.review.iter().find(|s| s.code == category.code())
    }
}

/// A time-boxed training cycle.
///
/// Updates always replace the whole record; there is no field-level patching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: SprintId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athlete_id: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_id: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<SprintDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<SprintDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub study_sessions: Vec<Value>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Epoch milliseconds. Used to order competing updates of the same sprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub teams: Vec<Team>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sprint {
    /// A sprint carrying nothing but its identifier.
    pub fn with_id(id: impl Into<SprintId>) -> Self {
        Self {
            id: id.into(),
            athlete_id: None,
            coach_id: None,
            start_date: None,
            end_date: None,
            events: Vec::new(),
            study_sessions: Vec::new(),
            created_at: None,
            updated_at: None,
            started: None,
            teams: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Look up an unmodelled field by its wire name.
    pub fn extra_field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// A user as listed by the gateway's `/users` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(rename = "fName", default)]
    pub first_name: String,
    #[serde(rename = "lName", default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentor: Option<ParticipantId>,
    #[serde(default)]
    pub instructor: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Participant {
    pub fn new(id: impl Into<ParticipantId>, first_name: &str, last_name: &str) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: None,
            phone: None,
            github: None,
            mentor: None,
            instructor: false,
            extra: Map::new(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A mission as described by a sprint template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMission {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_summary: Option<String>,
    #[serde(default)]
    pub xp: Points,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reusable set of missions offered by the gateway's `/templates` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SprintTemplate {
    pub title: String,
    #[serde(default)]
    pub missions: Vec<TemplateMission>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Wire values
// ---------------------------------------------------------------------------

/// A score or xp value as the gateway sent it, integer or fractional.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Points(pub Number);

impl Points {
    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(0.0)
    }
}

impl Default for Points {
    fn default() -> Self {
        Self(Number::from(0))
    }
}

impl From<i64> for Points {
    fn from(n: i64) -> Self {
        Self(Number::from(n))
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<Number>::deserialize(deserializer)?
            .map(Points)
            .unwrap_or_default())
    }
}

/// A sprint start or end date.
///
/// Accepted shapes: RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC), `YYYY-MM-DD`
/// (midnight UTC) and epoch milliseconds, as a number or a string. Anything
/// else is carried verbatim and written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum SprintDate {
    At(DateTime<Utc>),
    Unparsed(Value),
}

impl SprintDate {
    pub fn at(&self) -> Option<DateTime<Utc>> {
        match self {
            SprintDate::At(dt) => Some(*dt),
            SprintDate::Unparsed(_) => None,
        }
    }

    pub fn from_value(value: Value) -> Self {
        let parsed = match &value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(from_millis),
            Value::String(text) => parse_date_text(text.trim()),
            _ => None,
        };
        parsed.map(SprintDate::At).unwrap_or(SprintDate::Unparsed(value))
    }
}

impl From<DateTime<Utc>> for SprintDate {
    fn from(dt: DateTime<Utc>) -> Self {
        SprintDate::At(dt)
    }
}

impl Serialize for SprintDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SprintDate::At(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            SprintDate::Unparsed(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SprintDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(SprintDate::from_value)
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc());
    }
    text.parse::<i64>().ok().and_then(from_millis)
}

/// `null` reads as the field's default; gateways send both.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
