//! Keyset pagination over `(created_at DESC, id DESC)`.
//!
//! `has_more` is true whenever a page came back full. A final page that happens
//! to be exactly `limit` rows long therefore costs one extra, empty fetch; no
//! count query is issued to avoid it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::eligibility::{belongs_in_view, FeedKind, ViewContext};
use crate::error::DomainError;
use crate::models::{Activity, MembershipSets, PageCursor};
use crate::ports::{ActivityFilter, Gateway};

/// One page of rows plus the position to continue from.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub has_more: bool,
    /// Position of the last raw row the store returned.
    pub next_cursor: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            has_more: false,
            next_cursor: None,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

pub(crate) fn check_limit(limit: u32) -> Result<(), DomainError> {
    if limit == 0 {
        return Err(DomainError::Validation(
            "Page limit must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Store-side selection for a view. Eligibility is re-checked on the results.
pub fn filter_for_view(
    kind: FeedKind,
    user_id: Uuid,
    memberships: &MembershipSets,
    now: DateTime<Utc>,
) -> ActivityFilter {
    let sorted = |ids: Vec<Uuid>| {
        let mut ids = ids;
        ids.sort();
        ids
    };
    match kind {
        FeedKind::Browse => ActivityFilter::OpenNotExpired { now },
        FeedKind::Created => ActivityFilter::CreatedBy(user_id),
        FeedKind::Joined => {
            ActivityFilter::Ids(sorted(memberships.joined_as_member.iter().copied().collect()))
        }
        FeedKind::History => ActivityFilter::Ids(sorted(memberships.all().into_iter().collect())),
    }
}

/// Fetches the rows strictly after `cursor`.
///
/// An empty id filter returns an empty page without touching the store.
pub async fn fetch_page(
    gateway: &dyn Gateway,
    filter: &ActivityFilter,
    cursor: Option<&PageCursor>,
    limit: u32,
) -> Result<Page<Activity>, DomainError> {
    check_limit(limit)?;

    if let ActivityFilter::Ids(ids) = filter {
        if ids.is_empty() {
            return Ok(Page::empty());
        }
    }

    let rows = gateway.query_activities(filter, cursor, limit).await?;
    let has_more = rows.len() == limit as usize;
    let next_cursor = rows.last().map(Activity::cursor).or(cursor.copied());

    Ok(Page {
        rows,
        has_more,
        next_cursor,
    })
}

/// Fetches one page of a view and keeps only the rows the view's predicate accepts.
///
/// `has_more` and `next_cursor` describe the raw page, so rows filtered out
/// here never stall pagination.
pub async fn fetch_view_page(
    gateway: &dyn Gateway,
    kind: FeedKind,
    ctx: &ViewContext,
    cursor: Option<&PageCursor>,
    limit: u32,
) -> Result<Page<Activity>, DomainError> {
    let filter = filter_for_view(kind, ctx.user_id, &ctx.memberships, ctx.now);
    let mut page = fetch_page(gateway, &filter, cursor, limit).await?;

    let fetched = page.rows.len();
    page.rows.retain(|a| belongs_in_view(kind, a, ctx));

    tracing::debug!(
        view = %kind,
        fetched,
        kept = page.rows.len(),
        has_more = page.has_more,
        "Fetched feed page"
    );

    Ok(page)
}
