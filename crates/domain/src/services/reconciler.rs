//! Feed reconciler: merges pages and pushed row changes into a view's rows.
//!
//! Every function takes the current rows by reference and returns a fresh,
//! sorted, id-unique vector. Results depend only on the inputs, never on the
//! order in which pages or events arrived, so replays and echoes of local
//! mutations are harmless.

use std::collections::HashMap;
use uuid::Uuid;

use super::eligibility::{belongs_in_view, FeedKind, ViewContext};
use crate::models::Activity;
use crate::ports::{ChangeType, RawChange};

/// What a pushed activity change means for a view.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityChange {
    Upsert(Activity),
    Remove(Uuid),
}

/// Sorts newest first: `(created_at DESC, id DESC)`.
pub fn sort_feed(rows: &mut [Activity]) {
    rows.sort_by(|a, b| b.cursor().cmp(&a.cursor()));
}

/// Merges `new_rows` into `existing`; on id collision the new row wins.
pub fn append_page(existing: &[Activity], new_rows: &[Activity]) -> Vec<Activity> {
    let mut by_id: HashMap<Uuid, Activity> =
        existing.iter().map(|a| (a.id, a.clone())).collect();
    for row in new_rows {
        by_id.insert(row.id, row.clone());
    }

    let mut rows: Vec<Activity> = by_id.into_values().collect();
    sort_feed(&mut rows);
    rows
}

/// Interprets a pushed change on the activities table.
///
/// Returns `None` for payloads that cannot be reconciled (missing id, row
/// image that does not parse). Those are logged and otherwise ignored.
pub fn parse_activity_change(change: &RawChange) -> Option<ActivityChange> {
    match change.event_type {
        ChangeType::Delete => match change.row_id() {
            Some(id) => Some(ActivityChange::Remove(id)),
            None => {
                tracing::warn!("Dropping activity delete without a usable id");
                None
            }
        },
        ChangeType::Insert | ChangeType::Update => {
            let Some(row) = change.new.clone() else {
                tracing::warn!(event_type = ?change.event_type, "Dropping activity change without a row");
                return None;
            };
            match serde_json::from_value::<Activity>(row) {
                Ok(activity) => Some(ActivityChange::Upsert(activity)),
                Err(e) => {
                    tracing::warn!(
                        event_type = ?change.event_type,
                        row_id = ?change.row_id(),
                        error = %e,
                        "Dropping malformed activity change"
                    );
                    None
                }
            }
        }
    }
}

/// Applies an already parsed change to the rows of view `kind`.
///
/// An upserted row is re-checked against the view predicate and removed when
/// it no longer belongs; removing an absent id is a no-op.
pub fn apply_activity_change(
    existing: &[Activity],
    change: ActivityChange,
    kind: FeedKind,
    ctx: &ViewContext,
) -> Vec<Activity> {
    match change {
        ActivityChange::Remove(id) => existing.iter().filter(|a| a.id != id).cloned().collect(),
        ActivityChange::Upsert(activity) => {
            if belongs_in_view(kind, &activity, ctx) {
                append_page(existing, std::slice::from_ref(&activity))
            } else {
                existing
                    .iter()
                    .filter(|a| a.id != activity.id)
                    .cloned()
                    .collect()
            }
        }
    }
}

/// Merges one pushed change into the rows of view `kind`.
///
/// Malformed payloads leave the rows unchanged.
pub fn apply_realtime_change(
    existing: &[Activity],
    change: &RawChange,
    kind: FeedKind,
    ctx: &ViewContext,
) -> Vec<Activity> {
    match parse_activity_change(change) {
        Some(parsed) => apply_activity_change(existing, parsed, kind, ctx),
        None => existing.to_vec(),
    }
}

/// Drops rows that no longer satisfy the view predicate (after a membership
/// change or simply because time passed).
pub fn retain_eligible(existing: &[Activity], kind: FeedKind, ctx: &ViewContext) -> Vec<Activity> {
    existing
        .iter()
        .filter(|a| belongs_in_view(kind, a, ctx))
        .cloned()
        .collect()
}
