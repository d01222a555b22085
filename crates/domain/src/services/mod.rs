//! Domain services for the invite feed.
//!
//! Services contain the feed logic that operates on domain models through the
//! gateway ports.

pub mod activity;
pub mod eligibility;
pub mod invite_diff;
pub mod membership;
pub mod pagination;
pub mod reconciler;
pub mod room;
pub mod room_log;

#[cfg(test)]
pub(crate) mod fixtures;

use uuid::Uuid;

use crate::error::DomainError;
use crate::models::Activity;
use crate::ports::Gateway;

pub use activity::{ActivityService, EditOutcome};
pub use eligibility::{
    belongs_in_view, is_active_activity, is_expired_or_closed, is_joinable_activity, FeedKind,
    ViewContext,
};
pub use invite_diff::diff_invite_edit;
pub use membership::{JoinOutcome, MembershipService};
pub use pagination::{fetch_page, fetch_view_page, filter_for_view, Page};
pub use reconciler::{
    append_page, apply_activity_change, apply_realtime_change, parse_activity_change,
    retain_eligible, sort_feed, ActivityChange,
};
pub use room::{RoomAccess, RoomService};
pub use room_log::{
    append_event, append_system_event, get_events_page, merge_events, parse_event_change,
    validate_new_event,
};

/// Loads one activity by id.
pub async fn find_activity(
    gateway: &dyn Gateway,
    activity_id: Uuid,
) -> Result<Activity, DomainError> {
    gateway
        .query_activities_by_ids(&[activity_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::NotFound(format!("Activity {} not found", activity_id)))
}
