//! Room event log: append, backwards paging and merging of pushed events.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::pagination::{check_limit, Page};
use crate::error::DomainError;
use crate::models::{NewRoomEvent, PageCursor, QuickStatus, RoomEvent, RoomEventType, SystemEvent};
use crate::ports::{ChangeType, Gateway, RawChange};

/// Checks that `event` content is well-formed for its type.
pub fn validate_new_event(event: &NewRoomEvent) -> Result<(), DomainError> {
    match event.event_type {
        RoomEventType::Chat => shared::validation::validate_chat_text(&event.content).map_err(|e| {
            DomainError::Validation(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid chat message".to_string()),
            )
        }),
        RoomEventType::Quick => QuickStatus::from_str(&event.content)
            .map(|_| ())
            .map_err(DomainError::Validation),
        RoomEventType::System => match serde_json::from_str::<JsonValue>(&event.content) {
            Ok(JsonValue::Object(envelope)) if envelope.get("k").is_some_and(JsonValue::is_string) => {
                Ok(())
            }
            _ => Err(DomainError::Validation(
                "System event content must be a JSON object with a string \"k\"".to_string(),
            )),
        },
    }
}

pub async fn append_event(
    gateway: &dyn Gateway,
    event: &NewRoomEvent,
) -> Result<RoomEvent, DomainError> {
    validate_new_event(event)?;
    let stored = gateway.insert_event(event).await?;

    tracing::debug!(
        activity_id = %stored.activity_id,
        event_id = %stored.id,
        event_type = %stored.event_type,
        "Room event appended"
    );

    Ok(stored)
}

/// Appends a system event without letting a failure escape.
///
/// The caller's primary write has already succeeded; a failed narration is
/// logged and reported as `None`.
pub async fn append_system_event(
    gateway: &dyn Gateway,
    activity_id: Uuid,
    user_id: Option<Uuid>,
    event: &SystemEvent,
) -> Option<RoomEvent> {
    let new_event = NewRoomEvent::system(activity_id, user_id, event);
    match append_event(gateway, &new_event).await {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!(
                activity_id = %activity_id,
                user_id = ?user_id,
                key = ?event.key(),
                error = %e,
                "Failed to append system event"
            );
            None
        }
    }
}

/// Fetches the page of events older than `cursor`.
///
/// Rows come back oldest first. `next_cursor` points at the oldest row so the
/// following call continues further back in time; `boundary` hides events
/// created before it.
pub async fn get_events_page(
    gateway: &dyn Gateway,
    activity_id: Uuid,
    limit: u32,
    cursor: Option<&PageCursor>,
    boundary: Option<DateTime<Utc>>,
) -> Result<Page<RoomEvent>, DomainError> {
    check_limit(limit)?;

    let mut rows = gateway
        .query_events_page(activity_id, limit, cursor, boundary)
        .await?;
    let has_more = rows.len() == limit as usize;
    rows.reverse();
    let next_cursor = rows.first().map(RoomEvent::cursor).or(cursor.copied());

    Ok(Page {
        rows,
        has_more,
        next_cursor,
    })
}

/// Merges events by id into ascending `(created_at, id)` order.
pub fn merge_events(existing: &[RoomEvent], incoming: &[RoomEvent]) -> Vec<RoomEvent> {
    let mut by_id: HashMap<Uuid, RoomEvent> =
        existing.iter().map(|e| (e.id, e.clone())).collect();
    for event in incoming {
        by_id.insert(event.id, event.clone());
    }

    let mut events: Vec<RoomEvent> = by_id.into_values().collect();
    events.sort_by_key(RoomEvent::cursor);
    events
}

/// Interprets a pushed `room_events` insert for `activity_id`.
///
/// Events are immutable, so updates and deletes are ignored, as are rows for
/// other rooms and rows that fail to parse.
pub fn parse_event_change(change: &RawChange, activity_id: Uuid) -> Option<RoomEvent> {
    if change.event_type != ChangeType::Insert {
        return None;
    }
    let row = change.new.clone()?;
    match serde_json::from_value::<RoomEvent>(row) {
        Ok(event) if event.activity_id == activity_id => Some(event),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(
                activity_id = %activity_id,
                row_id = ?change.row_id(),
                error = %e,
                "Dropping malformed room event"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::InMemoryGateway;
    use crate::services::fixtures::activity;
    use serde_json::json;

    async fn room() -> (InMemoryGateway, Uuid, Uuid) {
        let gateway = InMemoryGateway::new();
        let user = Uuid::new_v4();
        let a = activity(user, 1);
        let id = a.id;
        gateway.put_activity(a).await;
        (gateway, id, user)
    }

    async fn send(gateway: &InMemoryGateway, activity_id: Uuid, user: Uuid, n: usize) -> Vec<RoomEvent> {
        let mut sent = Vec::new();
        for i in 0..n {
            let event = NewRoomEvent::chat(activity_id, user, &format!("message {}", i));
            sent.push(append_event(gateway, &event).await.unwrap());
        }
        sent
    }

    #[test]
    fn test_validate_new_event() {
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert!(validate_new_event(&NewRoomEvent::chat(room, user, "hello")).is_ok());
        assert!(validate_new_event(&NewRoomEvent::chat(room, user, "   ")).is_err());
        assert!(validate_new_event(&NewRoomEvent::chat(room, user, &"x".repeat(1001))).is_err());
        assert!(validate_new_event(&NewRoomEvent::quick(room, user, QuickStatus::Arrived)).is_ok());
        assert!(validate_new_event(&NewRoomEvent::system(room, None, &SystemEvent::Joined)).is_ok());

        let bad_quick = NewRoomEvent {
            content: "napping".to_string(),
            ..NewRoomEvent::quick(room, user, QuickStatus::Arrived)
        };
        assert!(validate_new_event(&bad_quick).is_err());

        for content in ["joined", r#"{"kind":"x"}"#, r#"{"k":1}"#, r#"["k"]"#] {
            let bad_system = NewRoomEvent {
                content: content.to_string(),
                ..NewRoomEvent::system(room, None, &SystemEvent::Joined)
            };
            assert!(validate_new_event(&bad_system).is_err(), "{}", content);
        }
    }

    #[tokio::test]
    async fn test_events_page_oldest_first_with_backward_cursor() {
        let (gateway, activity_id, user) = room().await;
        let sent = send(&gateway, activity_id, user, 5).await;

        let newest = get_events_page(&gateway, activity_id, 2, None, None).await.unwrap();
        assert_eq!(newest.rows, sent[3..5].to_vec());
        assert!(newest.has_more);
        assert_eq!(newest.next_cursor, Some(sent[3].cursor()));

        let older = get_events_page(&gateway, activity_id, 2, newest.next_cursor.as_ref(), None)
            .await
            .unwrap();
        assert_eq!(older.rows, sent[1..3].to_vec());

        let oldest = get_events_page(&gateway, activity_id, 2, older.next_cursor.as_ref(), None)
            .await
            .unwrap();
        assert_eq!(oldest.rows, sent[0..1].to_vec());
        assert!(!oldest.has_more);
    }

    #[tokio::test]
    async fn test_events_page_respects_boundary() {
        let (gateway, activity_id, user) = room().await;
        let sent = send(&gateway, activity_id, user, 4).await;

        let page = get_events_page(&gateway, activity_id, 10, None, Some(sent[2].created_at))
            .await
            .unwrap();
        assert_eq!(page.rows, sent[2..4].to_vec());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_append_rejects_invalid_content_without_writing() {
        let (gateway, activity_id, user) = room().await;
        let result = append_event(&gateway, &NewRoomEvent::chat(activity_id, user, "")).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(gateway.events_for(activity_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_append_system_event_swallows_failure() {
        let (gateway, activity_id, user) = room().await;
        gateway.fail_event_inserts(true).await;

        let stored = append_system_event(&gateway, activity_id, Some(user), &SystemEvent::Joined).await;
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_merge_events_dedups_and_orders() {
        let (gateway, activity_id, user) = room().await;
        let sent = send(&gateway, activity_id, user, 3).await;

        let merged = merge_events(&[sent[2].clone(), sent[0].clone()], &[sent[1].clone(), sent[2].clone()]);
        assert_eq!(merged, sent);
        assert_eq!(merge_events(&merged, &sent), sent);
    }

    #[test]
    fn test_parse_event_change() {
        let room = Uuid::new_v4();
        let row = json!({
            "id": Uuid::new_v4(),
            "activity_id": room,
            "user_id": null,
            "type": "system",
            "content": "{\"k\":\"room.system.joined\"}",
            "created_at": "2024-05-01T12:00:00Z"
        });

        let parsed = parse_event_change(&RawChange::insert(row.clone()), room).unwrap();
        assert_eq!(parsed.event_type, RoomEventType::System);

        assert!(parse_event_change(&RawChange::insert(row.clone()), Uuid::new_v4()).is_none());
        assert!(parse_event_change(&RawChange::update(row.clone(), None), room).is_none());
        assert!(parse_event_change(&RawChange::insert(json!({ "id": 1 })), room).is_none());
    }
}
