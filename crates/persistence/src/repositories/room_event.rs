//! Room event repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{NewRoomEvent, PageCursor};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{RoomEventEntity, RoomEventTypeDb};
use crate::metrics::QueryTimer;

/// Repository for the append-only room event log.
#[derive(Clone)]
pub struct RoomEventRepository {
    pool: PgPool,
}

impl RoomEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, event: &NewRoomEvent) -> Result<RoomEventEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_room_event");
        let result = sqlx::query_as::<_, RoomEventEntity>(
            r#"
            INSERT INTO room_events (activity_id, user_id, type, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, activity_id, user_id, type, content, created_at
            "#,
        )
        .bind(event.activity_id)
        .bind(event.user_id)
        .bind(RoomEventTypeDb::from(event.event_type))
        .bind(&event.content)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Events older than `cursor`, newest first, not before `boundary`.
    pub async fn find_page(
        &self,
        activity_id: Uuid,
        limit: i64,
        cursor: Option<&PageCursor>,
        boundary: Option<DateTime<Utc>>,
    ) -> Result<Vec<RoomEventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_room_event_page");
        let result = sqlx::query_as::<_, RoomEventEntity>(
            r#"
            SELECT id, activity_id, user_id, type, content, created_at
            FROM room_events
            WHERE activity_id = $1
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3::uuid))
              AND ($4::timestamptz IS NULL OR created_at >= $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(activity_id)
        .bind(cursor.map(|c| c.created_at))
        .bind(cursor.map(|c| c.id))
        .bind(boundary)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
