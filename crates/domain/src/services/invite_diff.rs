//! Turns an invite edit into the list of changes announced in the room.

use chrono::{DateTime, Utc};

use crate::models::{Activity, ExpiryMode, InviteChange, InviteEdit, Patch};

/// Timestamps are compared at millisecond precision; clients round-trip them
/// through formats that drop the rest.
fn same_instant(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
    a.map(|t| t.timestamp_millis()) == b.map(|t| t.timestamp_millis())
}

fn diff_datetime(
    before: Option<DateTime<Utc>>,
    patch: &Patch<DateTime<Utc>>,
) -> Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let after = patch.submitted()?.copied();
    (!same_instant(before, after)).then_some((before, after))
}

/// One entry per submitted field whose value actually changes, in a fixed
/// field order.
///
/// Fields absent from the edit produce nothing. An explicit `null` expiry
/// becomes `Expires { to_mode: Never }` when the invite had an expiry.
pub fn diff_invite_edit(before: &Activity, edit: &InviteEdit) -> Vec<InviteChange> {
    let mut changes = Vec::new();

    if let Some(title) = &edit.title {
        let to = title.trim();
        if to != before.title.trim() {
            changes.push(InviteChange::Title {
                from: before.title.clone(),
                to: to.to_string(),
            });
        }
    }

    if let Some(place) = &edit.place {
        let from = before.place.display_text();
        let to = place.display_text();
        if from != to {
            changes.push(InviteChange::Place { from, to });
        }
    }

    if let Some(gender) = edit.gender_pref {
        if gender != before.gender_pref {
            changes.push(InviteChange::Gender {
                from: before.gender_pref,
                to: gender,
            });
        }
    }

    if let Some(to) = edit.capacity.submitted() {
        let to = to.copied();
        if to != before.capacity {
            changes.push(InviteChange::Capacity {
                from: before.capacity,
                to,
            });
        }
    }

    if let Some((from, to)) = diff_datetime(before.start_time, &edit.start_time) {
        changes.push(InviteChange::StartTime { from, to });
    }

    if let Some((from, to)) = diff_datetime(before.end_time, &edit.end_time) {
        changes.push(InviteChange::EndTime { from, to });
    }

    match &edit.expires_at {
        Patch::NotProvided => {}
        Patch::Null => {
            if before.expires_at.is_some() {
                changes.push(InviteChange::Expires {
                    to_mode: ExpiryMode::Never,
                    to: None,
                });
            }
        }
        Patch::Value(to) => {
            if !same_instant(before.expires_at, Some(*to)) {
                changes.push(InviteChange::Expires {
                    to_mode: ExpiryMode::Datetime,
                    to: Some(*to),
                });
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenderPreference, Place};
    use crate::services::fixtures::{activity, base_time};
    use chrono::Duration;
    use uuid::Uuid;

    fn before() -> Activity {
        let mut a = activity(Uuid::new_v4(), 10);
        a.capacity = Some(4);
        a.expires_at = Some(base_time() + Duration::hours(2));
        a.start_time = Some(base_time() + Duration::hours(1));
        a
    }

    /// An edit that resubmits every field unchanged.
    fn identical_edit(a: &Activity) -> InviteEdit {
        InviteEdit {
            title: Some(a.title.clone()),
            place: Some(a.place.clone()),
            gender_pref: Some(a.gender_pref),
            capacity: a.capacity.into(),
            start_time: a.start_time.into(),
            end_time: a.end_time.into(),
            expires_at: a.expires_at.into(),
        }
    }

    #[test]
    fn test_identical_edit_has_no_changes() {
        let a = before();
        assert!(diff_invite_edit(&a, &identical_edit(&a)).is_empty());
        assert!(diff_invite_edit(&a, &InviteEdit::default()).is_empty());
    }

    #[test]
    fn test_capacity_to_unlimited() {
        let a = before();
        let edit = InviteEdit {
            capacity: Patch::Null,
            ..Default::default()
        };
        let changes = diff_invite_edit(&a, &edit);
        assert_eq!(
            changes,
            vec![InviteChange::Capacity {
                from: Some(4),
                to: None
            }]
        );
        assert_eq!(changes[0].kind(), "capacity");
    }

    #[test]
    fn test_expires_absent_vs_null() {
        let a = before();

        let absent = InviteEdit::default();
        assert!(diff_invite_edit(&a, &absent).is_empty());

        let cleared = InviteEdit {
            expires_at: Patch::Null,
            ..Default::default()
        };
        assert_eq!(
            diff_invite_edit(&a, &cleared),
            vec![InviteChange::Expires {
                to_mode: ExpiryMode::Never,
                to: None
            }]
        );
    }

    #[test]
    fn test_expires_null_on_never_expiring_invite_is_not_a_change() {
        let mut a = before();
        a.expires_at = None;
        let cleared = InviteEdit {
            expires_at: Patch::Null,
            ..Default::default()
        };
        assert!(diff_invite_edit(&a, &cleared).is_empty());
    }

    #[test]
    fn test_expires_new_datetime() {
        let a = before();
        let new_expiry = base_time() + Duration::hours(5);
        let edit = InviteEdit {
            expires_at: Patch::Value(new_expiry),
            ..Default::default()
        };
        assert_eq!(
            diff_invite_edit(&a, &edit),
            vec![InviteChange::Expires {
                to_mode: ExpiryMode::Datetime,
                to: Some(new_expiry)
            }]
        );
    }

    #[test]
    fn test_sub_millisecond_difference_is_ignored() {
        let a = before();
        let edit = InviteEdit {
            start_time: Patch::Value(a.start_time.unwrap() + Duration::microseconds(300)),
            ..Default::default()
        };
        assert!(diff_invite_edit(&a, &edit).is_empty());
    }

    #[test]
    fn test_title_whitespace_only_is_not_a_change() {
        let a = before();
        let edit = InviteEdit {
            title: Some(format!("  {}  ", a.title)),
            ..Default::default()
        };
        assert!(diff_invite_edit(&a, &edit).is_empty());

        let renamed = InviteEdit {
            title: Some(" Board games ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            diff_invite_edit(&a, &renamed),
            vec![InviteChange::Title {
                from: a.title.clone(),
                to: "Board games".to_string()
            }]
        );
    }

    #[test]
    fn test_place_compares_display_text() {
        let a = before();
        let moved_pin = InviteEdit {
            place: Some(Place {
                lat: Some(10.0),
                lng: Some(10.0),
                place_id: Some("other".to_string()),
                ..a.place.clone()
            }),
            ..Default::default()
        };
        assert!(diff_invite_edit(&a, &moved_pin).is_empty());

        let renamed = InviteEdit {
            place: Some(Place {
                name: Some("Old Mill".to_string()),
                ..a.place.clone()
            }),
            ..Default::default()
        };
        assert_eq!(
            diff_invite_edit(&a, &renamed),
            vec![InviteChange::Place {
                from: "Riverside / Quay 1".to_string(),
                to: "Old Mill / Quay 1".to_string()
            }]
        );
    }

    #[test]
    fn test_multiple_changes_in_field_order() {
        let a = before();
        let edit = InviteEdit {
            gender_pref: Some(GenderPreference::Female),
            end_time: Patch::Value(base_time() + Duration::hours(3)),
            title: Some("Late lunch".to_string()),
            start_time: Patch::Null,
            ..Default::default()
        };
        let kinds: Vec<&str> = diff_invite_edit(&a, &edit).iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["title", "gender", "start_time", "end_time"]);
    }
}
