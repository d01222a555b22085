//! Membership domain models: a user's relationship to an activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role within an activity. Fixed when the membership row is first written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Creator,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Creator => "creator",
            MemberRole::Member => "member",
        }
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creator" => Ok(MemberRole::Creator),
            "member" => Ok(MemberRole::Member),
            _ => Err(format!("Invalid member role: {}", s)),
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Join state. Transitions: joined -> left -> joined -> ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    Joined,
    Left,
}

impl MembershipState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipState::Joined => "joined",
            MembershipState::Left => "left",
        }
    }
}

impl FromStr for MembershipState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "joined" => Ok(MembershipState::Joined),
            "left" => Ok(MembershipState::Left),
            _ => Err(format!("Invalid membership state: {}", s)),
        }
    }
}

impl fmt::Display for MembershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row per (activity, user) pair. Re-joining updates the row in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub state: MembershipState,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub left_at: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn is_joined(&self) -> bool {
        self.state == MembershipState::Joined
    }

    pub fn is_creator(&self) -> bool {
        self.role == MemberRole::Creator
    }

    /// Earliest room event this member may read.
    ///
    /// A member who left and came back only sees events from their current join
    /// onwards; a member who never left sees the whole log.
    pub fn visibility_boundary(&self) -> Option<DateTime<Utc>> {
        self.left_at.map(|_| self.joined_at)
    }
}

/// Activity id sets derived from a user's membership rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSets {
    /// Currently joined, any role.
    pub joined: HashSet<Uuid>,
    /// Currently joined with role member (excludes own activities).
    pub joined_as_member: HashSet<Uuid>,
    /// Previously joined, now left.
    pub left: HashSet<Uuid>,
}

impl MembershipSets {
    pub fn from_rows(rows: &[Membership]) -> Self {
        let mut sets = Self::default();
        for row in rows {
            sets.apply(row);
        }
        sets
    }

    /// Folds one (possibly updated) membership row into the sets.
    pub fn apply(&mut self, row: &Membership) {
        let id = row.activity_id;
        match row.state {
            MembershipState::Joined => {
                self.left.remove(&id);
                self.joined.insert(id);
                if row.is_creator() {
                    self.joined_as_member.remove(&id);
                } else {
                    self.joined_as_member.insert(id);
                }
            }
            MembershipState::Left => {
                self.joined.remove(&id);
                self.joined_as_member.remove(&id);
                self.left.insert(id);
            }
        }
    }

    /// Drops every trace of `activity_id`, as when its membership row is deleted.
    pub fn forget(&mut self, activity_id: Uuid) {
        self.joined.remove(&activity_id);
        self.joined_as_member.remove(&activity_id);
        self.left.remove(&activity_id);
    }

    /// Every activity the user has a membership row for.
    pub fn all(&self) -> HashSet<Uuid> {
        self.joined.union(&self.left).copied().collect()
    }
}
