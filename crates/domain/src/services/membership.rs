//! Membership service: join and leave transitions.
//!
//! State machine per (activity, user): none -> joined -> left -> joined -> ...
//! One row per pair; re-joining updates it in place.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::eligibility::is_active_activity;
use super::find_activity;
use super::room_log::append_system_event;
use crate::error::DomainError;
use crate::models::{MemberRole, Membership, MembershipSets, MembershipState, RoomEvent, SystemEvent};
use crate::ports::Gateway;

/// Result of a join request.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub membership: Membership,
    /// False when the user was already joined and nothing was written.
    pub newly_joined: bool,
    /// The "joined" system event, if it could be written.
    pub event: Option<RoomEvent>,
}

#[derive(Clone)]
pub struct MembershipService {
    gateway: Arc<dyn Gateway>,
}

impl MembershipService {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn get_memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, DomainError> {
        Ok(self.gateway.list_memberships(user_id).await?)
    }

    pub async fn membership_sets(&self, user_id: Uuid) -> Result<MembershipSets, DomainError> {
        let rows = self.get_memberships(user_id).await?;
        Ok(MembershipSets::from_rows(&rows))
    }

    /// Joins `user_id` to an active activity.
    ///
    /// Joining while already joined is a no-op. Members are limited by the
    /// activity's capacity; the creator never counts against it.
    pub async fn join(&self, activity_id: Uuid, user_id: Uuid) -> Result<JoinOutcome, DomainError> {
        let activity = find_activity(self.gateway.as_ref(), activity_id).await?;
        let existing = self.gateway.get_membership(activity_id, user_id).await?;

        if let Some(current) = existing.as_ref().filter(|m| m.is_joined()) {
            return Ok(JoinOutcome {
                membership: current.clone(),
                newly_joined: false,
                event: None,
            });
        }

        if !is_active_activity(&activity, Utc::now()) {
            return Err(DomainError::Forbidden(
                "Activity is closed or expired".to_string(),
            ));
        }

        let role = match &existing {
            Some(row) if row.is_creator() => MemberRole::Creator,
            _ => MemberRole::Member,
        };

        if role == MemberRole::Member {
            if let Some(capacity) = activity.capacity {
                let joined = self.gateway.count_joined_members(activity_id).await?;
                if joined >= i64::from(capacity) {
                    return Err(DomainError::Conflict("Activity is full".to_string()));
                }
            }
        }

        let membership = self
            .gateway
            .upsert_membership(activity_id, user_id, role, MembershipState::Joined)
            .await?;

        tracing::info!(
            activity_id = %activity_id,
            user_id = %user_id,
            role = %membership.role,
            rejoin = existing.is_some(),
            "User joined activity"
        );

        let event = append_system_event(
            self.gateway.as_ref(),
            activity_id,
            Some(user_id),
            &SystemEvent::Joined,
        )
        .await;

        Ok(JoinOutcome {
            membership,
            newly_joined: true,
            event,
        })
    }

    /// Marks the membership as left. The row is kept and no room event is written.
    pub async fn leave(&self, activity_id: Uuid, user_id: Uuid) -> Result<Membership, DomainError> {
        let existing = self
            .gateway
            .get_membership(activity_id, user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Membership not found".to_string()))?;

        if existing.state == MembershipState::Left {
            return Ok(existing);
        }

        let membership = self
            .gateway
            .upsert_membership(activity_id, user_id, existing.role, MembershipState::Left)
            .await?;

        tracing::info!(
            activity_id = %activity_id,
            user_id = %user_id,
            "User left activity"
        );

        Ok(membership)
    }
}
