//! Activity repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{Activity, NewActivity, PageCursor};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{
    ActivityEntity, ActivityStatusDb, GenderPreferenceDb, MemberRoleDb, MembershipStateDb,
    ACTIVITY_COLUMNS,
};
use crate::metrics::QueryTimer;

/// Row selection for [`ActivityRepository::find_page`].
#[derive(Debug, Clone, Copy)]
pub enum ActivitySelection<'a> {
    OpenAt(DateTime<Utc>),
    CreatedBy(Uuid),
    Ids(&'a [Uuid]),
}

/// Repository for activity-related database operations.
#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an activity and the creator's membership in one transaction.
    pub async fn create_with_creator(
        &self,
        creator_id: Uuid,
        input: &NewActivity,
    ) -> Result<ActivityEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_activity");
        let mut tx = self.pool.begin().await?;

        let activity = sqlx::query_as::<_, ActivityEntity>(&format!(
            r#"
            INSERT INTO activities (creator_id, title, place_name, place_address, lat, lng,
                                    place_id, location_source, gender_pref, capacity,
                                    expires_at, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ACTIVITY_COLUMNS}
            "#
        ))
        .bind(creator_id)
        .bind(input.title.trim())
        .bind(&input.place.name)
        .bind(&input.place.address)
        .bind(input.place.lat)
        .bind(input.place.lng)
        .bind(&input.place.place_id)
        .bind(&input.place.location_source)
        .bind(GenderPreferenceDb::from(input.gender_pref))
        .bind(input.capacity)
        .bind(input.expires_at)
        .bind(input.start_time)
        .bind(input.end_time)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO memberships (activity_id, user_id, role, state, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(activity.id)
        .bind(creator_id)
        .bind(MemberRoleDb::Creator)
        .bind(MembershipStateDb::Joined)
        .bind(activity.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(activity)
    }

    /// Rows strictly older than `cursor` in `(created_at DESC, id DESC)` order.
    pub async fn find_page(
        &self,
        selection: ActivitySelection<'_>,
        cursor: Option<&PageCursor>,
        limit: i64,
    ) -> Result<Vec<ActivityEntity>, sqlx::Error> {
        let cursor_created_at = cursor.map(|c| c.created_at);
        let cursor_id = cursor.map(|c| c.id);

        let (timer, result) = match selection {
            ActivitySelection::OpenAt(now) => {
                let timer = QueryTimer::new("find_open_activity_page");
                let result = sqlx::query_as::<_, ActivityEntity>(&format!(
                    r#"
                    SELECT {ACTIVITY_COLUMNS}
                    FROM activities
                    WHERE status = 'open'
                      AND (expires_at IS NULL OR expires_at > $1)
                      AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3::uuid))
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#
                ))
                .bind(now)
                .bind(cursor_created_at)
                .bind(cursor_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await;
                (timer, result)
            }
            ActivitySelection::CreatedBy(creator_id) => {
                let timer = QueryTimer::new("find_created_activity_page");
                let result = sqlx::query_as::<_, ActivityEntity>(&format!(
                    r#"
                    SELECT {ACTIVITY_COLUMNS}
                    FROM activities
                    WHERE creator_id = $1
                      AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3::uuid))
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#
                ))
                .bind(creator_id)
                .bind(cursor_created_at)
                .bind(cursor_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await;
                (timer, result)
            }
            ActivitySelection::Ids(ids) => {
                let timer = QueryTimer::new("find_activity_page_by_ids");
                let result = sqlx::query_as::<_, ActivityEntity>(&format!(
                    r#"
                    SELECT {ACTIVITY_COLUMNS}
                    FROM activities
                    WHERE id = ANY($1)
                      AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3::uuid))
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#
                ))
                .bind(ids)
                .bind(cursor_created_at)
                .bind(cursor_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await;
                (timer, result)
            }
        };

        timer.record();
        result
    }

    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ActivityEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_activities_by_ids");
        let result = sqlx::query_as::<_, ActivityEntity>(&format!(
            r#"
            SELECT {ACTIVITY_COLUMNS}
            FROM activities
            WHERE id = ANY($1)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Write the author-editable fields and status. Returns `None` if the row is gone.
    pub async fn update(&self, activity: &Activity) -> Result<Option<ActivityEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_activity");
        let result = sqlx::query_as::<_, ActivityEntity>(&format!(
            r#"
            UPDATE activities
            SET title = $2, place_name = $3, place_address = $4, lat = $5, lng = $6,
                place_id = $7, location_source = $8, gender_pref = $9, capacity = $10,
                status = $11, expires_at = $12, start_time = $13, end_time = $14
            WHERE id = $1
            RETURNING {ACTIVITY_COLUMNS}
            "#
        ))
        .bind(activity.id)
        .bind(&activity.title)
        .bind(&activity.place.name)
        .bind(&activity.place.address)
        .bind(activity.place.lat)
        .bind(activity.place.lng)
        .bind(&activity.place.place_id)
        .bind(&activity.place.location_source)
        .bind(GenderPreferenceDb::from(activity.gender_pref))
        .bind(activity.capacity)
        .bind(ActivityStatusDb::from(activity.status))
        .bind(activity.expires_at)
        .bind(activity.start_time)
        .bind(activity.end_time)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
