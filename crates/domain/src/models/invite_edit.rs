//! Invite edit payloads and the change records derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::activity::{Activity, GenderPreference, Place};

/// An optional-and-nullable edit field.
///
/// `NotProvided` (key absent) leaves the stored value alone, `Null` clears it,
/// `Value` replaces it. A plain `Option` cannot tell the first two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch<T> {
    NotProvided,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::NotProvided
    }
}

impl<T> Patch<T> {
    pub fn is_not_provided(&self) -> bool {
        matches!(self, Patch::NotProvided)
    }

    pub fn is_provided(&self) -> bool {
        !self.is_not_provided()
    }

    /// The submitted value, if any was submitted.
    pub fn submitted(&self) -> Option<Option<&T>> {
        match self {
            Patch::NotProvided => None,
            Patch::Null => Some(None),
            Patch::Value(v) => Some(Some(v)),
        }
    }
}

impl<T: Clone> Patch<T> {
    /// Resolves the field against the currently stored value.
    pub fn apply(&self, current: Option<T>) -> Option<T> {
        match self {
            Patch::NotProvided => current,
            Patch::Null => None,
            Patch::Value(v) => Some(v.clone()),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        }
    }
}

// Absent keys never reach this impl: `#[serde(default)]` yields `NotProvided`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Value(v) => serializer.serialize_some(v),
            Patch::Null | Patch::NotProvided => serializer.serialize_none(),
        }
    }
}

/// Fields an author may change on their invite. Absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InviteEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<Place>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender_pref: Option<GenderPreference>,

    #[serde(default, skip_serializing_if = "Patch::is_not_provided")]
    pub capacity: Patch<i32>,

    #[serde(default, skip_serializing_if = "Patch::is_not_provided")]
    pub start_time: Patch<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Patch::is_not_provided")]
    pub end_time: Patch<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Patch::is_not_provided")]
    pub expires_at: Patch<DateTime<Utc>>,
}

impl InviteEdit {
    /// Returns the activity as it will look once this edit is stored.
    pub fn apply_to(&self, activity: &Activity) -> Activity {
        let mut updated = activity.clone();
        if let Some(title) = &self.title {
            updated.title = title.trim().to_string();
        }
        if let Some(place) = &self.place {
            updated.place = place.clone();
        }
        if let Some(gender_pref) = self.gender_pref {
            updated.gender_pref = gender_pref;
        }
        updated.capacity = self.capacity.apply(activity.capacity);
        updated.start_time = self.start_time.apply(activity.start_time);
        updated.end_time = self.end_time.apply(activity.end_time);
        updated.expires_at = self.expires_at.apply(activity.expires_at);
        updated
    }
}

/// How the expiry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryMode {
    Never,
    Datetime,
}

/// One field-level difference produced by an invite edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InviteChange {
    Title {
        from: String,
        to: String,
    },
    Place {
        from: String,
        to: String,
    },
    Gender {
        from: GenderPreference,
        to: GenderPreference,
    },
    Capacity {
        from: Option<i32>,
        to: Option<i32>,
    },
    StartTime {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    EndTime {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    Expires {
        to_mode: ExpiryMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<DateTime<Utc>>,
    },
}

impl InviteChange {
    pub fn kind(&self) -> &'static str {
        match self {
            InviteChange::Title { .. } => "title",
            InviteChange::Place { .. } => "place",
            InviteChange::Gender { .. } => "gender",
            InviteChange::Capacity { .. } => "capacity",
            InviteChange::StartTime { .. } => "start_time",
            InviteChange::EndTime { .. } => "end_time",
            InviteChange::Expires { .. } => "expires",
        }
    }
}
