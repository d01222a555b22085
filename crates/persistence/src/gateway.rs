//! PostgreSQL implementation of the domain [`Gateway`] port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{
    Activity, MemberRole, Membership, MembershipState, NewActivity, NewRoomEvent, PageCursor,
    RoomEvent,
};
use domain::ports::{ActivityFilter, Gateway};
use domain::GatewayError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repositories::{
    ActivityRepository, ActivitySelection, MembershipRepository, RoomEventRepository,
};

/// Maps a database error onto the gateway taxonomy.
pub fn map_sqlx_error(err: sqlx::Error) -> GatewayError {
    match err {
        sqlx::Error::RowNotFound => GatewayError::NotFound("Row not found".into()),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => GatewayError::Conflict("Row already exists".into()),
            Some("23503") => GatewayError::NotFound("Referenced row not found".into()),
            _ => GatewayError::Transient(format!("Database error: {}", db_err)),
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            GatewayError::Malformed(format!("Database error: {}", err))
        }
        _ => GatewayError::Transient(format!("Database error: {}", err)),
    }
}

/// Gateway over the activities, memberships and room_events tables.
#[derive(Clone)]
pub struct PostgresGateway {
    activities: ActivityRepository,
    memberships: MembershipRepository,
    events: RoomEventRepository,
}

impl PostgresGateway {
    pub fn new(pool: PgPool) -> Self {
        Self {
            activities: ActivityRepository::new(pool.clone()),
            memberships: MembershipRepository::new(pool.clone()),
            events: RoomEventRepository::new(pool),
        }
    }
}

#[async_trait]
impl Gateway for PostgresGateway {
    async fn query_activities(
        &self,
        filter: &ActivityFilter,
        cursor: Option<&PageCursor>,
        limit: u32,
    ) -> Result<Vec<Activity>, GatewayError> {
        let selection = match filter {
            ActivityFilter::OpenNotExpired { now } => ActivitySelection::OpenAt(*now),
            ActivityFilter::CreatedBy(user_id) => ActivitySelection::CreatedBy(*user_id),
            ActivityFilter::Ids(ids) => ActivitySelection::Ids(ids),
        };
        let rows = self
            .activities
            .find_page(selection, cursor, i64::from(limit))
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn query_activities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Activity>, GatewayError> {
        let rows = self
            .activities
            .find_by_ids(ids)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_activity(
        &self,
        creator_id: Uuid,
        input: &NewActivity,
    ) -> Result<Activity, GatewayError> {
        let row = self
            .activities
            .create_with_creator(creator_id, input)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_activity(&self, activity: &Activity) -> Result<Activity, GatewayError> {
        self.activities
            .update(activity)
            .await
            .map_err(map_sqlx_error)?
            .map(Into::into)
            .ok_or_else(|| GatewayError::NotFound(format!("activity {}", activity.id)))
    }

    async fn upsert_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
        state: MembershipState,
    ) -> Result<Membership, GatewayError> {
        let row = self
            .memberships
            .upsert(activity_id, user_id, role.into(), state.into())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn get_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, GatewayError> {
        let row = self
            .memberships
            .find(activity_id, user_id)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, GatewayError> {
        let rows = self
            .memberships
            .list_for_user(user_id)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_joined_members(&self, activity_id: Uuid) -> Result<i64, GatewayError> {
        self.memberships
            .count_joined_members(activity_id)
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_event(&self, event: &NewRoomEvent) -> Result<RoomEvent, GatewayError> {
        let row = self.events.insert(event).await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn query_events_page(
        &self,
        activity_id: Uuid,
        limit: u32,
        cursor: Option<&PageCursor>,
        boundary: Option<DateTime<Utc>>,
    ) -> Result<Vec<RoomEvent>, GatewayError> {
        let rows = self
            .events
            .find_page(activity_id, i64::from(limit), cursor, boundary)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
