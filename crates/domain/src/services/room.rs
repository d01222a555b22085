//! Room access and posting for joined members.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::eligibility::is_active_activity;
use super::find_activity;
use super::pagination::Page;
use super::room_log::{append_event, get_events_page};
use crate::error::DomainError;
use crate::models::{Activity, Membership, NewRoomEvent, PageCursor, QuickStatus, RoomEvent};
use crate::ports::Gateway;

/// What a member may see of a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomAccess {
    pub activity: Activity,
    pub membership: Membership,
    /// Oldest visible event time, `None` for the whole log.
    pub boundary: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct RoomService {
    gateway: Arc<dyn Gateway>,
}

impl RoomService {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Resolves access for a joined member. Closed or expired rooms stay readable.
    pub async fn open(&self, activity_id: Uuid, user_id: Uuid) -> Result<RoomAccess, DomainError> {
        let activity = find_activity(self.gateway.as_ref(), activity_id).await?;
        let membership = self.joined_membership(activity_id, user_id).await?;
        let boundary = membership.visibility_boundary();

        Ok(RoomAccess {
            activity,
            membership,
            boundary,
        })
    }

    pub async fn events_page(
        &self,
        access: &RoomAccess,
        limit: u32,
        cursor: Option<&PageCursor>,
    ) -> Result<Page<RoomEvent>, DomainError> {
        get_events_page(
            self.gateway.as_ref(),
            access.activity.id,
            limit,
            cursor,
            access.boundary,
        )
        .await
    }

    pub async fn send_chat(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        text: &str,
    ) -> Result<RoomEvent, DomainError> {
        self.ensure_can_post(activity_id, user_id).await?;
        append_event(
            self.gateway.as_ref(),
            &NewRoomEvent::chat(activity_id, user_id, text),
        )
        .await
    }

    pub async fn send_quick(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        status: QuickStatus,
    ) -> Result<RoomEvent, DomainError> {
        self.ensure_can_post(activity_id, user_id).await?;
        append_event(
            self.gateway.as_ref(),
            &NewRoomEvent::quick(activity_id, user_id, status),
        )
        .await
    }

    async fn joined_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Membership, DomainError> {
        match self.gateway.get_membership(activity_id, user_id).await? {
            Some(membership) if membership.is_joined() => Ok(membership),
            _ => Err(DomainError::Forbidden(
                "Only joined members can access this room".to_string(),
            )),
        }
    }

    async fn ensure_can_post(&self, activity_id: Uuid, user_id: Uuid) -> Result<(), DomainError> {
        let activity = find_activity(self.gateway.as_ref(), activity_id).await?;
        self.joined_membership(activity_id, user_id).await?;
        if !is_active_activity(&activity, Utc::now()) {
            return Err(DomainError::Forbidden(
                "Activity is closed or expired".to_string(),
            ));
        }
        Ok(())
    }
}
