//! Membership entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{MemberRole, Membership, MembershipState};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for member_role that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
pub enum MemberRoleDb {
    Creator,
    Member,
}

impl From<MemberRoleDb> for MemberRole {
    fn from(role: MemberRoleDb) -> Self {
        match role {
            MemberRoleDb::Creator => MemberRole::Creator,
            MemberRoleDb::Member => MemberRole::Member,
        }
    }
}

impl From<MemberRole> for MemberRoleDb {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Creator => MemberRoleDb::Creator,
            MemberRole::Member => MemberRoleDb::Member,
        }
    }
}

/// Database enum for membership_state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "membership_state", rename_all = "lowercase")]
pub enum MembershipStateDb {
    Joined,
    Left,
}

impl From<MembershipStateDb> for MembershipState {
    fn from(state: MembershipStateDb) -> Self {
        match state {
            MembershipStateDb::Joined => MembershipState::Joined,
            MembershipStateDb::Left => MembershipState::Left,
        }
    }
}

impl From<MembershipState> for MembershipStateDb {
    fn from(state: MembershipState) -> Self {
        match state {
            MembershipState::Joined => MembershipStateDb::Joined,
            MembershipState::Left => MembershipStateDb::Left,
        }
    }
}

/// Database row mapping for the memberships table.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipEntity {
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRoleDb,
    pub state: MembershipStateDb,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl From<MembershipEntity> for Membership {
    fn from(entity: MembershipEntity) -> Self {
        Self {
            activity_id: entity.activity_id,
            user_id: entity.user_id,
            role: entity.role.into(),
            state: entity.state.into(),
            joined_at: entity.joined_at,
            left_at: entity.left_at,
        }
    }
}
