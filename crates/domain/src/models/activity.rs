//! Activity (invite) domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::cursor::PageCursor;

/// Lifecycle status of an activity. Closing is a status change, never a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Open,
    Closed,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Open => "open",
            ActivityStatus::Closed => "closed",
        }
    }
}

impl FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(ActivityStatus::Open),
            "closed" => Ok(ActivityStatus::Closed),
            _ => Err(format!("Invalid activity status: {}", s)),
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who the author would like to meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderPreference {
    #[default]
    Any,
    Female,
    Male,
}

impl GenderPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderPreference::Any => "any",
            GenderPreference::Female => "female",
            GenderPreference::Male => "male",
        }
    }
}

impl FromStr for GenderPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(GenderPreference::Any),
            "female" => Ok(GenderPreference::Female),
            "male" => Ok(GenderPreference::Male),
            _ => Err(format!("Invalid gender preference: {}", s)),
        }
    }
}

impl fmt::Display for GenderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an activity takes place.
///
/// Stored flat on the activity row, hence the `place_` prefixes on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Place {
    #[serde(rename = "place_name")]
    pub name: Option<String>,

    #[serde(rename = "place_address")]
    pub address: Option<String>,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub lat: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub lng: Option<f64>,

    pub place_id: Option<String>,

    /// Where the coordinates came from (e.g. "gps", "search", "manual").
    pub location_source: Option<String>,
}

impl Place {
    /// Human-readable "name / address" text, skipping blank parts.
    ///
    /// Two places with the same display text are treated as the same place when
    /// describing edits.
    pub fn display_text(&self) -> String {
        [self.name.as_deref(), self.address.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// An invite: a short-lived, time-boxed activity others can join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    #[serde(flatten)]
    pub place: Place,
    #[serde(default)]
    pub gender_pref: GenderPreference,
    /// `None` means unlimited.
    pub capacity: Option<i32>,
    pub status: ActivityStatus,
    /// `None` means the invite never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// Position of this row in the feed ordering.
    pub fn cursor(&self) -> PageCursor {
        PageCursor::new(self.created_at, self.id)
    }
}

/// Request payload for creating an activity.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_new_activity_schedule"))]
pub struct NewActivity {
    #[validate(custom(function = "shared::validation::validate_title"))]
    pub title: String,

    #[validate(nested)]
    #[serde(flatten)]
    pub place: Place,

    #[serde(default)]
    pub gender_pref: GenderPreference,

    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: Option<i32>,

    pub expires_at: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

fn validate_new_activity_schedule(input: &NewActivity) -> Result<(), ValidationError> {
    validate_schedule(input.start_time, input.end_time)
}

/// Validates that an end time never precedes its start time.
pub fn validate_schedule(
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start_time, end_time) {
        (Some(start), Some(end)) if end < start => {
            let mut err = ValidationError::new("schedule_order");
            err.message = Some("End time must not be before start time".into());
            Err(err)
        }
        _ => Ok(()),
    }
}
