//! Ports to the external collaborators: relational store, push channel and identity.
//!
//! Implementations live outside this crate (PostgreSQL in `persistence`) except
//! for [`memory::InMemoryGateway`], which backs tests and local development.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::models::{
    Activity, MemberRole, Membership, MembershipState, NewActivity, NewRoomEvent, PageCursor,
    RoomEvent,
};

pub use memory::InMemoryGateway;

/// Row selection for an activity page. Ordering is always `(created_at DESC, id DESC)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityFilter {
    /// Status open and not expired at `now`.
    OpenNotExpired { now: DateTime<Utc> },
    /// Authored by the given user.
    CreatedBy(Uuid),
    /// Any of the given ids.
    Ids(Vec<Uuid>),
}

impl ActivityFilter {
    /// Evaluates the filter against one row, as a store would.
    pub fn matches(&self, activity: &Activity) -> bool {
        match self {
            ActivityFilter::OpenNotExpired { now } => {
                crate::services::eligibility::is_active_activity(activity, *now)
            }
            ActivityFilter::CreatedBy(user_id) => activity.creator_id == *user_id,
            ActivityFilter::Ids(ids) => ids.contains(&activity.id),
        }
    }
}

/// Store operations consumed by the feed core.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Rows matching `filter` strictly after `cursor`, newest first, at most `limit`.
    async fn query_activities(
        &self,
        filter: &ActivityFilter,
        cursor: Option<&PageCursor>,
        limit: u32,
    ) -> Result<Vec<Activity>, GatewayError>;

    async fn query_activities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Activity>, GatewayError>;

    /// Inserts the activity together with the creator's membership row.
    async fn insert_activity(
        &self,
        creator_id: Uuid,
        input: &NewActivity,
    ) -> Result<Activity, GatewayError>;

    /// Writes the author-editable fields and status of an existing activity.
    async fn update_activity(&self, activity: &Activity) -> Result<Activity, GatewayError>;

    /// Creates or updates the single row for `(activity_id, user_id)`.
    ///
    /// Moving to `Joined` stamps `joined_at`; moving to `Left` stamps `left_at`.
    async fn upsert_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
        state: MembershipState,
    ) -> Result<Membership, GatewayError>;

    async fn get_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, GatewayError>;

    async fn list_memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, GatewayError>;

    /// Number of joined members with role member.
    async fn count_joined_members(&self, activity_id: Uuid) -> Result<i64, GatewayError>;

    async fn insert_event(&self, event: &NewRoomEvent) -> Result<RoomEvent, GatewayError>;

    /// Events strictly before `cursor`, newest first, at most `limit`, never
    /// older than `boundary` when one is given.
    async fn query_events_page(
        &self,
        activity_id: Uuid,
        limit: u32,
        cursor: Option<&PageCursor>,
        boundary: Option<DateTime<Utc>>,
    ) -> Result<Vec<RoomEvent>, GatewayError>;
}

/// What a push subscription listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Activities,
    Memberships { user_id: Uuid },
    RoomEvents { activity_id: Uuid },
}

impl Topic {
    pub fn table(&self) -> &'static str {
        match self {
            Topic::Activities => "activities",
            Topic::Memberships { .. } => "memberships",
            Topic::RoomEvents { .. } => "room_events",
        }
    }

    /// Whether a row change on `table` belongs to this topic.
    pub fn matches(&self, table: &str, change: &RawChange) -> bool {
        if table != self.table() {
            return false;
        }
        match self {
            Topic::Activities => true,
            Topic::Memberships { user_id } => change.row_field_is("user_id", user_id),
            Topic::RoomEvents { activity_id } => change.row_field_is("activity_id", activity_id),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Activities => write!(f, "activities"),
            Topic::Memberships { user_id } => write!(f, "memberships:{}", user_id),
            Topic::RoomEvents { activity_id } => write!(f, "room_events:{}", activity_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// A row change as delivered by the push channel, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
    pub event_type: ChangeType,
    #[serde(default)]
    pub new: Option<JsonValue>,
    #[serde(default)]
    pub old: Option<JsonValue>,
}

impl RawChange {
    pub fn insert(new: JsonValue) -> Self {
        Self {
            event_type: ChangeType::Insert,
            new: Some(new),
            old: None,
        }
    }

    pub fn update(new: JsonValue, old: Option<JsonValue>) -> Self {
        Self {
            event_type: ChangeType::Update,
            new: Some(new),
            old,
        }
    }

    pub fn delete(old: JsonValue) -> Self {
        Self {
            event_type: ChangeType::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// The row image that identifies the change: `old` for deletes, `new` otherwise.
    pub fn row(&self) -> Option<&JsonValue> {
        match self.event_type {
            ChangeType::Delete => self.old.as_ref(),
            ChangeType::Insert | ChangeType::Update => self.new.as_ref(),
        }
    }

    /// Row `id`, if present and well-formed.
    pub fn row_id(&self) -> Option<Uuid> {
        self.row()
            .and_then(|row| row.get("id"))
            .and_then(JsonValue::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    fn row_field_is(&self, field: &str, expected: &Uuid) -> bool {
        self.row()
            .and_then(|row| row.get(field))
            .and_then(JsonValue::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .is_some_and(|id| id == *expected)
    }
}

/// A live push subscription, scoped to its owner.
///
/// Dropping the subscription or cancelling its token ends delivery.
#[derive(Debug)]
pub struct Subscription {
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<RawChange>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(
        topic: Topic,
        receiver: mpsc::UnboundedReceiver<RawChange>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            topic,
            receiver,
            cancel,
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Next change, or `None` once the subscription is cancelled or the channel closes.
    pub async fn next(&mut self) -> Option<RawChange> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            change = self.receiver.recv() => change,
        }
    }

    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Push channel delivering row changes.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Starts delivering changes for `topic` until `cancel` fires.
    async fn subscribe(
        &self,
        topic: Topic,
        cancel: CancellationToken,
    ) -> Result<Subscription, GatewayError>;
}

/// Identity collaborator.
pub trait Identity: Send + Sync {
    fn current_user_id(&self) -> Option<Uuid>;
}

/// Identity fixed at construction; `None` models a signed-out session.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentity(pub Option<Uuid>);

impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<Uuid> {
        self.0
    }
}
