//! Membership repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{MemberRoleDb, MembershipEntity, MembershipStateDb};
use crate::metrics::QueryTimer;

/// Repository for membership rows, one per (activity, user).
#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update the membership row.
    ///
    /// An existing creator row keeps its role. Joining stamps `joined_at`,
    /// leaving stamps `left_at`; the other timestamp is preserved.
    pub async fn upsert(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        role: MemberRoleDb,
        state: MembershipStateDb,
    ) -> Result<MembershipEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_membership");
        let result = sqlx::query_as::<_, MembershipEntity>(
            r#"
            INSERT INTO memberships (activity_id, user_id, role, state, joined_at, left_at)
            VALUES ($1, $2, $3, $4, NOW(), CASE WHEN $4 = 'left'::membership_state THEN NOW() END)
            ON CONFLICT (activity_id, user_id) DO UPDATE SET
                role = CASE WHEN memberships.role = 'creator' THEN memberships.role ELSE EXCLUDED.role END,
                state = EXCLUDED.state,
                joined_at = CASE WHEN EXCLUDED.state = 'joined' THEN NOW() ELSE memberships.joined_at END,
                left_at = CASE WHEN EXCLUDED.state = 'left' THEN NOW() ELSE memberships.left_at END
            RETURNING activity_id, user_id, role, state, joined_at, left_at
            "#,
        )
        .bind(activity_id)
        .bind(user_id)
        .bind(role)
        .bind(state)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_membership");
        let result = sqlx::query_as::<_, MembershipEntity>(
            r#"
            SELECT activity_id, user_id, role, state, joined_at, left_at
            FROM memberships
            WHERE activity_id = $1 AND user_id = $2
            "#,
        )
        .bind(activity_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<MembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_user_memberships");
        let result = sqlx::query_as::<_, MembershipEntity>(
            r#"
            SELECT activity_id, user_id, role, state, joined_at, left_at
            FROM memberships
            WHERE user_id = $1
            ORDER BY joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Joined members excluding the creator.
    pub async fn count_joined_members(&self, activity_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_joined_members");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM memberships
            WHERE activity_id = $1 AND state = 'joined' AND role = 'member'
            "#,
        )
        .bind(activity_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
