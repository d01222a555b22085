//! Shared builders for service tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use fake::faker::address::en::{CityName, StreetName};
use fake::Fake;
use uuid::Uuid;

use crate::models::{Activity, ActivityStatus, GenderPreference, Place};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Open, never-expiring activity created `minutes_ago` before [`base_time`].
pub fn activity(creator_id: Uuid, minutes_ago: i64) -> Activity {
    Activity {
        id: Uuid::new_v4(),
        creator_id,
        title: format!("Activity from {} minutes ago", minutes_ago),
        place: Place {
            name: Some(CityName().fake()),
            address: Some(StreetName().fake()),
            lat: Some(48.14),
            lng: Some(17.1),
            place_id: None,
            location_source: Some("manual".to_string()),
        },
        gender_pref: GenderPreference::Any,
        capacity: None,
        status: ActivityStatus::Open,
        expires_at: None,
        start_time: None,
        end_time: None,
        created_at: base_time() - Duration::minutes(minutes_ago),
    }
}
