//! Room event log models: chat, quick status and system narration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::cursor::PageCursor;
use super::invite_edit::InviteChange;

/// Kind of room event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomEventType {
    Chat,
    Quick,
    System,
}

impl RoomEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomEventType::Chat => "chat",
            RoomEventType::Quick => "quick",
            RoomEventType::System => "system",
        }
    }
}

impl FromStr for RoomEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(RoomEventType::Chat),
            "quick" => Ok(RoomEventType::Quick),
            "system" => Ok(RoomEventType::System),
            _ => Err(format!("Invalid room event type: {}", s)),
        }
    }
}

impl fmt::Display for RoomEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Predefined status updates a member can post without typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickStatus {
    Arrived,
    RunningLate,
    Cancelling,
}

impl QuickStatus {
    pub const ALL: [QuickStatus; 3] = [
        QuickStatus::Arrived,
        QuickStatus::RunningLate,
        QuickStatus::Cancelling,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            QuickStatus::Arrived => "arrived",
            QuickStatus::RunningLate => "running_late",
            QuickStatus::Cancelling => "cancelling",
        }
    }
}

impl FromStr for QuickStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuickStatus::ALL
            .into_iter()
            .find(|status| status.code() == s)
            .ok_or_else(|| format!("Unknown quick status code: {}", s))
    }
}

impl fmt::Display for QuickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

pub const SYSTEM_JOINED: &str = "room.system.joined";
pub const SYSTEM_LEFT: &str = "room.system.left";
pub const SYSTEM_INVITE_UPDATED: &str = "room.system.invite_updated";
pub const SYSTEM_INVITE_CLOSED: &str = "room.system.invite_closed";

/// Typed form of a system event's `{"k": ..., "p": ...}` content.
///
/// Parsing never fails: content that is not a valid envelope becomes
/// `Unparseable` and is rendered as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    Joined,
    Left,
    InviteUpdated { changes: Vec<InviteChange> },
    InviteClosed,
    /// Well-formed envelope with a key this build does not know.
    Other {
        key: String,
        params: Option<JsonValue>,
    },
    Unparseable(String),
}

impl SystemEvent {
    pub fn parse(content: &str) -> Self {
        let Ok(JsonValue::Object(mut envelope)) = serde_json::from_str::<JsonValue>(content) else {
            return SystemEvent::Unparseable(content.to_string());
        };
        let Some(JsonValue::String(key)) = envelope.remove("k") else {
            return SystemEvent::Unparseable(content.to_string());
        };
        let params = envelope.remove("p").filter(|p| !p.is_null());

        match key.as_str() {
            SYSTEM_JOINED => SystemEvent::Joined,
            SYSTEM_LEFT => SystemEvent::Left,
            SYSTEM_INVITE_CLOSED => SystemEvent::InviteClosed,
            SYSTEM_INVITE_UPDATED => {
                let changes = params
                    .as_ref()
                    .and_then(|p| p.get("changes"))
                    .cloned()
                    .map(serde_json::from_value::<Vec<InviteChange>>);
                match changes {
                    Some(Ok(changes)) => SystemEvent::InviteUpdated { changes },
                    _ => SystemEvent::Unparseable(content.to_string()),
                }
            }
            _ => SystemEvent::Other {
                key: key.clone(),
                params,
            },
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            SystemEvent::Joined => Some(SYSTEM_JOINED),
            SystemEvent::Left => Some(SYSTEM_LEFT),
            SystemEvent::InviteUpdated { .. } => Some(SYSTEM_INVITE_UPDATED),
            SystemEvent::InviteClosed => Some(SYSTEM_INVITE_CLOSED),
            SystemEvent::Other { key, .. } => Some(key),
            SystemEvent::Unparseable(_) => None,
        }
    }

    /// Serializes to the stored text form.
    pub fn to_content(&self) -> String {
        let params = match self {
            SystemEvent::InviteUpdated { changes } => Some(json!({ "changes": changes })),
            SystemEvent::Other { params, .. } => params.clone(),
            SystemEvent::Unparseable(raw) => return raw.clone(),
            _ => None,
        };

        let mut envelope = Map::new();
        if let Some(key) = self.key() {
            envelope.insert("k".to_string(), JsonValue::String(key.to_string()));
        }
        if let Some(params) = params {
            envelope.insert("p".to_string(), params);
        }
        JsonValue::Object(envelope).to_string()
    }
}

/// An immutable entry in an activity's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub id: Uuid,
    pub activity_id: Uuid,
    /// `None` for events no user authored.
    pub user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub event_type: RoomEventType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Content of a room event interpreted according to its type.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEventBody {
    Chat(String),
    Quick(QuickStatus),
    System(SystemEvent),
    /// Quick event carrying a code outside the known set.
    Raw(String),
}

impl RoomEvent {
    pub fn cursor(&self) -> PageCursor {
        PageCursor::new(self.created_at, self.id)
    }

    pub fn body(&self) -> RoomEventBody {
        match self.event_type {
            RoomEventType::Chat => RoomEventBody::Chat(self.content.clone()),
            RoomEventType::Quick => match QuickStatus::from_str(&self.content) {
                Ok(status) => RoomEventBody::Quick(status),
                Err(_) => RoomEventBody::Raw(self.content.clone()),
            },
            RoomEventType::System => RoomEventBody::System(SystemEvent::parse(&self.content)),
        }
    }
}

/// Event about to be appended to a room log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoomEvent {
    pub activity_id: Uuid,
    pub user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub event_type: RoomEventType,
    pub content: String,
}

impl NewRoomEvent {
    pub fn chat(activity_id: Uuid, user_id: Uuid, text: &str) -> Self {
        Self {
            activity_id,
            user_id: Some(user_id),
            event_type: RoomEventType::Chat,
            content: text.trim().to_string(),
        }
    }

    pub fn quick(activity_id: Uuid, user_id: Uuid, status: QuickStatus) -> Self {
        Self {
            activity_id,
            user_id: Some(user_id),
            event_type: RoomEventType::Quick,
            content: status.code().to_string(),
        }
    }

    pub fn system(activity_id: Uuid, user_id: Option<Uuid>, event: &SystemEvent) -> Self {
        Self {
            activity_id,
            user_id,
            event_type: RoomEventType::System,
            content: event.to_content(),
        }
    }
}
