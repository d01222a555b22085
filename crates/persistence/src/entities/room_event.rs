//! Room event entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{RoomEvent, RoomEventType};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for room_event_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "room_event_type", rename_all = "lowercase")]
pub enum RoomEventTypeDb {
    Chat,
    Quick,
    System,
}

impl From<RoomEventTypeDb> for RoomEventType {
    fn from(event_type: RoomEventTypeDb) -> Self {
        match event_type {
            RoomEventTypeDb::Chat => RoomEventType::Chat,
            RoomEventTypeDb::Quick => RoomEventType::Quick,
            RoomEventTypeDb::System => RoomEventType::System,
        }
    }
}

impl From<RoomEventType> for RoomEventTypeDb {
    fn from(event_type: RoomEventType) -> Self {
        match event_type {
            RoomEventType::Chat => RoomEventTypeDb::Chat,
            RoomEventType::Quick => RoomEventTypeDb::Quick,
            RoomEventType::System => RoomEventTypeDb::System,
        }
    }
}

/// Database row mapping for the room_events table.
#[derive(Debug, Clone, FromRow)]
pub struct RoomEventEntity {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub user_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    pub event_type: RoomEventTypeDb,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<RoomEventEntity> for RoomEvent {
    fn from(entity: RoomEventEntity) -> Self {
        Self {
            id: entity.id,
            activity_id: entity.activity_id,
            user_id: entity.user_id,
            event_type: entity.event_type.into(),
            content: entity.content,
            created_at: entity.created_at,
        }
    }
}
