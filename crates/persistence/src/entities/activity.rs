//! Activity entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Activity, ActivityStatus, GenderPreference, Place};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for activity_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "activity_status", rename_all = "lowercase")]
pub enum ActivityStatusDb {
    Open,
    Closed,
}

impl From<ActivityStatusDb> for ActivityStatus {
    fn from(status: ActivityStatusDb) -> Self {
        match status {
            ActivityStatusDb::Open => ActivityStatus::Open,
            ActivityStatusDb::Closed => ActivityStatus::Closed,
        }
    }
}

impl From<ActivityStatus> for ActivityStatusDb {
    fn from(status: ActivityStatus) -> Self {
        match status {
            ActivityStatus::Open => ActivityStatusDb::Open,
            ActivityStatus::Closed => ActivityStatusDb::Closed,
        }
    }
}

/// Database enum for gender_preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "gender_preference", rename_all = "lowercase")]
pub enum GenderPreferenceDb {
    Any,
    Female,
    Male,
}

impl From<GenderPreferenceDb> for GenderPreference {
    fn from(pref: GenderPreferenceDb) -> Self {
        match pref {
            GenderPreferenceDb::Any => GenderPreference::Any,
            GenderPreferenceDb::Female => GenderPreference::Female,
            GenderPreferenceDb::Male => GenderPreference::Male,
        }
    }
}

impl From<GenderPreference> for GenderPreferenceDb {
    fn from(pref: GenderPreference) -> Self {
        match pref {
            GenderPreference::Any => GenderPreferenceDb::Any,
            GenderPreference::Female => GenderPreferenceDb::Female,
            GenderPreference::Male => GenderPreferenceDb::Male,
        }
    }
}

/// Column list shared by every activity query.
pub const ACTIVITY_COLUMNS: &str = "id, creator_id, title, place_name, place_address, lat, lng, \
     place_id, location_source, gender_pref, capacity, status, expires_at, start_time, end_time, \
     created_at";

/// Database row mapping for the activities table.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityEntity {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub place_name: Option<String>,
    pub place_address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub place_id: Option<String>,
    pub location_source: Option<String>,
    pub gender_pref: GenderPreferenceDb,
    pub capacity: Option<i32>,
    pub status: ActivityStatusDb,
    pub expires_at: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityEntity> for Activity {
    fn from(entity: ActivityEntity) -> Self {
        Self {
            id: entity.id,
            creator_id: entity.creator_id,
            title: entity.title,
            place: Place {
                name: entity.place_name,
                address: entity.place_address,
                lat: entity.lat,
                lng: entity.lng,
                place_id: entity.place_id,
                location_source: entity.location_source,
            },
            gender_pref: entity.gender_pref.into(),
            capacity: entity.capacity,
            status: entity.status.into(),
            expires_at: entity.expires_at,
            start_time: entity.start_time,
            end_time: entity.end_time,
            created_at: entity.created_at,
        }
    }
}
