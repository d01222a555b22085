//! Eligibility predicates deciding which feed view an activity belongs to.
//!
//! All functions are pure. Callers pass a fresh `now` on every page fetch and
//! every realtime event; results must not be cached across renders because
//! expiry moves with the clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{Activity, ActivityStatus, MembershipSets};

/// Open and not yet expired. At `now == expires_at` the activity is inactive.
pub fn is_active_activity(activity: &Activity, now: DateTime<Utc>) -> bool {
    activity.status == ActivityStatus::Open && activity.expires_at.map_or(true, |e| e > now)
}

/// Active and not already joined by the viewer.
pub fn is_joinable_activity(
    activity: &Activity,
    joined: &HashSet<Uuid>,
    now: DateTime<Utc>,
) -> bool {
    is_active_activity(activity, now)
        && !joined.contains(&activity.id)
        && activity.status == ActivityStatus::Open
}

pub fn is_expired_or_closed(activity: &Activity, now: DateTime<Utc>) -> bool {
    activity.status != ActivityStatus::Open || activity.expires_at.is_some_and(|e| e <= now)
}

/// The independently paginated feed views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Joinable invites by other people.
    Browse,
    /// The viewer's own active invites.
    Created,
    /// Active invites the viewer joined as a member.
    Joined,
    /// Invites the viewer left, or that ended while they were in them.
    History,
}

impl FeedKind {
    pub const ALL: [FeedKind; 4] = [
        FeedKind::Browse,
        FeedKind::Created,
        FeedKind::Joined,
        FeedKind::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Browse => "browse",
            FeedKind::Created => "created",
            FeedKind::Joined => "joined",
            FeedKind::History => "history",
        }
    }

    /// Whether the view's rows depend on the viewer's membership rows.
    pub fn is_membership_scoped(&self) -> bool {
        matches!(self, FeedKind::Joined | FeedKind::History)
    }
}

impl FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browse" => Ok(FeedKind::Browse),
            "created" => Ok(FeedKind::Created),
            "joined" => Ok(FeedKind::Joined),
            "history" => Ok(FeedKind::History),
            _ => Err(format!("Invalid feed kind: {}", s)),
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ambient inputs to a view predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewContext {
    pub user_id: Uuid,
    pub memberships: MembershipSets,
    pub now: DateTime<Utc>,
}

impl ViewContext {
    pub fn new(user_id: Uuid, memberships: MembershipSets, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            memberships,
            now,
        }
    }

    /// Same context evaluated at a later instant.
    pub fn at(&self, now: DateTime<Utc>) -> Self {
        Self {
            now,
            ..self.clone()
        }
    }
}

/// Whether `activity` belongs in view `kind` under `ctx`.
pub fn belongs_in_view(kind: FeedKind, activity: &Activity, ctx: &ViewContext) -> bool {
    let me = ctx.user_id;
    let sets = &ctx.memberships;
    match kind {
        FeedKind::Browse => {
            is_joinable_activity(activity, &sets.joined, ctx.now) && activity.creator_id != me
        }
        FeedKind::Created => activity.creator_id == me && is_active_activity(activity, ctx.now),
        FeedKind::Joined => {
            sets.joined.contains(&activity.id)
                && activity.creator_id != me
                && is_active_activity(activity, ctx.now)
        }
        FeedKind::History => {
            sets.left.contains(&activity.id)
                || (sets.joined.contains(&activity.id) && is_expired_or_closed(activity, ctx.now))
        }
    }
}
