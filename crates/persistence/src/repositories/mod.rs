//! Repository implementations for database operations.

pub mod activity;
pub mod membership;
pub mod room_event;

pub use activity::{ActivityRepository, ActivitySelection};
pub use membership::MembershipRepository;
pub use room_event::RoomEventRepository;
