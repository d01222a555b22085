//! Domain models for the invite feed.

pub mod activity;
pub mod cursor;
pub mod invite_edit;
pub mod membership;
pub mod room_event;

pub use activity::{
    validate_schedule, Activity, ActivityStatus, GenderPreference, NewActivity, Place,
};
pub use cursor::PageCursor;
pub use invite_edit::{ExpiryMode, InviteChange, InviteEdit, Patch};
pub use membership::{MemberRole, Membership, MembershipSets, MembershipState};
pub use room_event::{
    NewRoomEvent, QuickStatus, RoomEvent, RoomEventBody, RoomEventType, SystemEvent,
};
