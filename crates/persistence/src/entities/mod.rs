//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod activity;
pub mod membership;
pub mod room_event;

pub use activity::{ActivityEntity, ActivityStatusDb, GenderPreferenceDb, ACTIVITY_COLUMNS};
pub use membership::{MemberRoleDb, MembershipEntity, MembershipStateDb};
pub use room_event::{RoomEventEntity, RoomEventTypeDb};
