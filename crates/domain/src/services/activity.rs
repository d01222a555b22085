//! Activity service: create, edit and close invites.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::eligibility::is_active_activity;
use super::find_activity;
use super::invite_diff::diff_invite_edit;
use super::room_log::append_system_event;
use crate::error::DomainError;
use crate::models::{
    validate_schedule, Activity, ActivityStatus, InviteChange, InviteEdit, NewActivity, Patch,
    SystemEvent,
};
use crate::ports::Gateway;

/// Result of an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub activity: Activity,
    pub changes: Vec<InviteChange>,
    /// Whether the change list was posted to the room.
    pub announced: bool,
}

#[derive(Clone)]
pub struct ActivityService {
    gateway: Arc<dyn Gateway>,
}

impl ActivityService {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn get(&self, activity_id: Uuid) -> Result<Activity, DomainError> {
        find_activity(self.gateway.as_ref(), activity_id).await
    }

    /// Creates an invite owned by `creator_id`, who is joined to it as creator.
    pub async fn create(
        &self,
        creator_id: Uuid,
        input: &NewActivity,
    ) -> Result<Activity, DomainError> {
        input.validate()?;
        let activity = self.gateway.insert_activity(creator_id, input).await?;

        tracing::info!(
            activity_id = %activity.id,
            creator_id = %creator_id,
            "Activity created"
        );

        Ok(activity)
    }

    /// Applies an author's edit.
    ///
    /// The change list is announced in the room only when it is non-empty, the
    /// author is still joined and the edited invite is active. The update
    /// itself applies regardless.
    pub async fn edit(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
        edit: &InviteEdit,
    ) -> Result<EditOutcome, DomainError> {
        let before = self.owned_activity(user_id, activity_id).await?;
        validate_edit(edit)?;

        let changes = diff_invite_edit(&before, edit);
        let proposed = edit.apply_to(&before);
        validate_schedule(proposed.start_time, proposed.end_time)
            .map_err(|e| DomainError::Validation(message_of(&e, "Invalid schedule")))?;

        let activity = self.gateway.update_activity(&proposed).await?;

        let author_joined = self
            .gateway
            .get_membership(activity_id, user_id)
            .await?
            .is_some_and(|m| m.is_joined());

        let announced = if !changes.is_empty()
            && author_joined
            && is_active_activity(&activity, Utc::now())
        {
            append_system_event(
                self.gateway.as_ref(),
                activity_id,
                Some(user_id),
                &SystemEvent::InviteUpdated {
                    changes: changes.clone(),
                },
            )
            .await
            .is_some()
        } else {
            false
        };

        tracing::info!(
            activity_id = %activity_id,
            user_id = %user_id,
            changes = changes.len(),
            announced,
            "Activity edited"
        );

        Ok(EditOutcome {
            activity,
            changes,
            announced,
        })
    }

    /// Closes the invite. Closing twice is a no-op.
    pub async fn close(&self, user_id: Uuid, activity_id: Uuid) -> Result<Activity, DomainError> {
        let activity = self.owned_activity(user_id, activity_id).await?;
        if activity.status == ActivityStatus::Closed {
            return Ok(activity);
        }

        let closed = self
            .gateway
            .update_activity(&Activity {
                status: ActivityStatus::Closed,
                ..activity
            })
            .await?;

        tracing::info!(activity_id = %activity_id, user_id = %user_id, "Activity closed");

        append_system_event(
            self.gateway.as_ref(),
            activity_id,
            Some(user_id),
            &SystemEvent::InviteClosed,
        )
        .await;

        Ok(closed)
    }

    async fn owned_activity(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
    ) -> Result<Activity, DomainError> {
        let activity = find_activity(self.gateway.as_ref(), activity_id).await?;
        if activity.creator_id != user_id {
            tracing::warn!(
                activity_id = %activity_id,
                user_id = %user_id,
                "Rejected change to activity by non-creator"
            );
            return Err(DomainError::Forbidden(
                "Only the creator can change this activity".to_string(),
            ));
        }
        Ok(activity)
    }
}

fn message_of(err: &validator::ValidationError, fallback: &str) -> String {
    err.message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

fn validate_edit(edit: &InviteEdit) -> Result<(), DomainError> {
    if let Some(title) = &edit.title {
        shared::validation::validate_title(title)
            .map_err(|e| DomainError::Validation(message_of(&e, "Invalid title")))?;
    }
    if let Some(place) = &edit.place {
        place.validate()?;
    }
    if let Patch::Value(capacity) = edit.capacity {
        if capacity < 1 {
            return Err(DomainError::Validation(
                "Capacity must be at least 1".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InviteChange, MembershipState, Place, RoomEventBody};
    use crate::ports::InMemoryGateway;
    use crate::services::membership::MembershipService;
    use chrono::Duration;

    struct Harness {
        gateway: Arc<InMemoryGateway>,
        service: ActivityService,
        creator: Uuid,
        activity: Activity,
    }

    async fn harness() -> Harness {
        let gateway = Arc::new(InMemoryGateway::new());
        let service = ActivityService::new(gateway.clone());
        let creator = Uuid::new_v4();
        let activity = service
            .create(
                creator,
                &NewActivity {
                    title: "Sunset walk".to_string(),
                    capacity: Some(4),
                    expires_at: Some(Utc::now() + Duration::hours(3)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        Harness {
            gateway,
            service,
            creator,
            activity,
        }
    }

    fn system_events(events: &[crate::models::RoomEvent]) -> Vec<SystemEvent> {
        events
            .iter()
            .filter_map(|e| match e.body() {
                RoomEventBody::System(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let h = harness().await;
        let result = h
            .service
            .create(
                h.creator,
                &NewActivity {
                    title: "".to_string(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_trims_title_and_opens() {
        let h = harness().await;
        let created = h
            .service
            .create(
                h.creator,
                &NewActivity {
                    title: "  Padel  ".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.title, "Padel");
        assert_eq!(created.status, ActivityStatus::Open);
    }

    #[tokio::test]
    async fn test_edit_announces_changes() {
        let h = harness().await;
        let edit = InviteEdit {
            capacity: Patch::Null,
            expires_at: Patch::Null,
            ..Default::default()
        };

        let outcome = h.service.edit(h.creator, h.activity.id, &edit).await.unwrap();
        assert!(outcome.announced);
        assert_eq!(outcome.activity.capacity, None);
        assert_eq!(outcome.activity.expires_at, None);
        assert_eq!(outcome.changes.len(), 2);

        let events = system_events(&h.gateway.events_for(h.activity.id).await);
        assert_eq!(
            events,
            vec![SystemEvent::InviteUpdated {
                changes: outcome.changes.clone()
            }]
        );
    }

    #[tokio::test]
    async fn test_edit_without_changes_is_silent() {
        let h = harness().await;
        let edit = InviteEdit {
            title: Some("Sunset walk".to_string()),
            ..Default::default()
        };

        let outcome = h.service.edit(h.creator, h.activity.id, &edit).await.unwrap();
        assert!(outcome.changes.is_empty());
        assert!(!outcome.announced);
        assert!(h.gateway.events_for(h.activity.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_edit_expiring_invite_applies_but_is_not_announced() {
        let h = harness().await;
        let edit = InviteEdit {
            expires_at: Patch::Value(Utc::now() - Duration::minutes(1)),
            ..Default::default()
        };

        let outcome = h.service.edit(h.creator, h.activity.id, &edit).await.unwrap();
        assert_eq!(outcome.changes.len(), 1);
        assert!(!outcome.announced);
        assert_eq!(
            h.gateway.activity(h.activity.id).await.unwrap().expires_at,
            outcome.activity.expires_at
        );
    }

    #[tokio::test]
    async fn test_edit_by_departed_author_is_not_announced() {
        let h = harness().await;
        MembershipService::new(h.gateway.clone())
            .leave(h.activity.id, h.creator)
            .await
            .unwrap();
        let edit = InviteEdit {
            title: Some("Night walk".to_string()),
            ..Default::default()
        };

        let outcome = h.service.edit(h.creator, h.activity.id, &edit).await.unwrap();
        assert_eq!(outcome.activity.title, "Night walk");
        assert!(!outcome.announced);
    }

    #[tokio::test]
    async fn test_edit_rules() {
        let h = harness().await;
        let stranger = Uuid::new_v4();
        let rename = InviteEdit {
            title: Some("Mine now".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            h.service.edit(stranger, h.activity.id, &rename).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            h.service.edit(h.creator, Uuid::new_v4(), &rename).await,
            Err(DomainError::NotFound(_))
        ));

        let zero = InviteEdit {
            capacity: Patch::Value(0),
            ..Default::default()
        };
        assert!(matches!(
            h.service.edit(h.creator, h.activity.id, &zero).await,
            Err(DomainError::Validation(_))
        ));

        let start = Utc::now() + Duration::hours(2);
        let backwards = InviteEdit {
            start_time: Patch::Value(start),
            end_time: Patch::Value(start - Duration::hours(1)),
            ..Default::default()
        };
        assert!(matches!(
            h.service.edit(h.creator, h.activity.id, &backwards).await,
            Err(DomainError::Validation(_))
        ));

        let bad_place = InviteEdit {
            place: Some(Place {
                lng: Some(200.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            h.service.edit(h.creator, h.activity.id, &bad_place).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_close_announces_once() {
        let h = harness().await;

        let closed = h.service.close(h.creator, h.activity.id).await.unwrap();
        assert_eq!(closed.status, ActivityStatus::Closed);
        let again = h.service.close(h.creator, h.activity.id).await.unwrap();
        assert_eq!(again.status, ActivityStatus::Closed);

        let events = system_events(&h.gateway.events_for(h.activity.id).await);
        assert_eq!(events, vec![SystemEvent::InviteClosed]);
    }

    #[tokio::test]
    async fn test_close_by_stranger_is_forbidden() {
        let h = harness().await;
        assert!(matches!(
            h.service.close(Uuid::new_v4(), h.activity.id).await,
            Err(DomainError::Forbidden(_))
        ));
        let membership = h
            .gateway
            .get_membership(h.activity.id, h.creator)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(membership.state, MembershipState::Joined);
    }

    #[tokio::test]
    async fn test_edit_change_payload_shape() {
        let h = harness().await;
        let edit = InviteEdit {
            title: Some("Sunrise walk".to_string()),
            ..Default::default()
        };
        let outcome = h.service.edit(h.creator, h.activity.id, &edit).await.unwrap();
        assert_eq!(
            outcome.changes,
            vec![InviteChange::Title {
                from: "Sunset walk".to_string(),
                to: "Sunrise walk".to_string()
            }]
        );
    }
}
