//! Live feed view for one [`FeedKind`].
//!
//! The view keeps the rows it has paged in, folds pushed activity and
//! membership changes into them and republishes a whole snapshot after every
//! change. Pages requested before a `refresh` or `close` are discarded when
//! they arrive.

use chrono::Utc;
use domain::models::{Activity, Membership, MembershipSets, MembershipState, PageCursor};
use domain::ports::{ChangeType, Gateway, RawChange, RealtimeChannel, Subscription, Topic};
use domain::services::{
    append_page, apply_activity_change, fetch_view_page, parse_activity_change, retain_eligible,
    ActivityChange, FeedKind, ViewContext,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{next_change, next_tick, sweep_interval, LoadOutcome, ViewSettings};
use crate::error::ClientError;

/// What a feed view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub kind: FeedKind,
    /// Newest first, unique by id.
    pub rows: Vec<Activity>,
    pub has_more: bool,
    /// Opaque position after the last row, for resuming with
    /// [`FeedClient::open_feed_after`](crate::FeedClient::open_feed_after).
    pub next_cursor: Option<String>,
    /// Bumped by every `refresh`.
    pub generation: u64,
}

impl FeedSnapshot {
    pub fn contains(&self, activity_id: Uuid) -> bool {
        self.rows.iter().any(|a| a.id == activity_id)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.rows.iter().map(|a| a.id).collect()
    }
}

#[derive(Debug)]
struct FeedState {
    rows: Vec<Activity>,
    memberships: MembershipSets,
    next_cursor: Option<PageCursor>,
    has_more: bool,
    generation: u64,
}

struct FeedCore {
    kind: FeedKind,
    user_id: Uuid,
    gateway: Arc<dyn Gateway>,
    page_size: u32,
    state: Mutex<FeedState>,
    snapshots: watch::Sender<Arc<FeedSnapshot>>,
    cancel: CancellationToken,
}

impl FeedCore {
    fn context(&self, state: &FeedState) -> ViewContext {
        ViewContext::new(self.user_id, state.memberships.clone(), Utc::now())
    }

    fn publish(&self, state: &FeedState) {
        self.snapshots.send_replace(Arc::new(FeedSnapshot {
            kind: self.kind,
            rows: state.rows.clone(),
            has_more: state.has_more,
            next_cursor: state.next_cursor.map(|c| c.to_token()),
            generation: state.generation,
        }));
    }

    /// Replaces the rows and publishes only when something actually changed.
    fn replace_rows(&self, state: &mut FeedState, rows: Vec<Activity>) -> bool {
        if rows == state.rows {
            return false;
        }
        state.rows = rows;
        self.publish(state);
        true
    }

    /// Fetches the next page, or the first one again when `reset` is set.
    async fn load_page(&self, reset: bool) -> Result<LoadOutcome, ClientError> {
        if self.cancel.is_cancelled() {
            return Ok(LoadOutcome::Discarded);
        }

        let (generation, cursor, mut ctx) = {
            let mut state = self.state.lock().await;
            if reset {
                state.generation += 1;
            } else if !state.has_more {
                return Ok(LoadOutcome::Exhausted);
            }
            let cursor = if reset { None } else { state.next_cursor };
            (state.generation, cursor, self.context(&state))
        };

        if reset {
            let rows = self.gateway.list_memberships(self.user_id).await?;
            ctx.memberships = MembershipSets::from_rows(&rows);
        }

        let page = fetch_view_page(
            self.gateway.as_ref(),
            self.kind,
            &ctx,
            cursor.as_ref(),
            self.page_size,
        )
        .await?;

        let mut state = self.state.lock().await;
        if self.cancel.is_cancelled() || state.generation != generation {
            tracing::debug!(
                view = %self.kind,
                requested = generation,
                current = state.generation,
                "Discarding stale feed page"
            );
            return Ok(LoadOutcome::Discarded);
        }

        let before = if reset { 0 } else { state.rows.len() };
        if reset {
            state.memberships = ctx.memberships;
        }
        // Memberships may have moved while the page was in flight.
        let fresh = retain_eligible(&page.rows, self.kind, &self.context(&state));
        if reset {
            state.rows = append_page(&[], &fresh);
        } else {
            state.rows = append_page(&state.rows, &fresh);
        }
        state.next_cursor = page.next_cursor;
        state.has_more = page.has_more;
        self.publish(&state);

        Ok(LoadOutcome::Applied {
            added: state.rows.len().saturating_sub(before),
        })
    }

    async fn on_activity_change(&self, change: RawChange) {
        let Some(parsed) = parse_activity_change(&change) else {
            return;
        };

        let mut state = self.state.lock().await;
        if self.cancel.is_cancelled() {
            return;
        }
        let ctx = self.context(&state);
        let rows = apply_activity_change(&state.rows, parsed, self.kind, &ctx);
        self.replace_rows(&mut state, rows);
    }

    async fn on_membership_change(&self, change: RawChange) {
        let Some(row) = change.row().cloned() else {
            tracing::warn!(view = %self.kind, "Dropping membership change without a row");
            return;
        };
        let membership = match serde_json::from_value::<Membership>(row) {
            Ok(membership) => membership,
            Err(e) => {
                tracing::warn!(view = %self.kind, error = %e, "Dropping malformed membership change");
                return;
            }
        };
        if membership.user_id != self.user_id {
            return;
        }
        let activity_id = membership.activity_id;

        let fetch_generation = {
            let mut state = self.state.lock().await;
            if self.cancel.is_cancelled() {
                return;
            }
            if change.event_type == ChangeType::Delete {
                state.memberships.forget(activity_id);
            } else {
                state.memberships.apply(&membership);
            }

            let ctx = self.context(&state);
            let rows = retain_eligible(&state.rows, self.kind, &ctx);
            self.replace_rows(&mut state, rows);

            let missing = !state.rows.iter().any(|a| a.id == activity_id);
            (change.event_type != ChangeType::Delete
                && missing
                && may_gain_row(self.kind, &membership))
            .then_some(state.generation)
        };

        let Some(generation) = fetch_generation else {
            return;
        };

        let fetched = match self.gateway.query_activities_by_ids(&[activity_id]).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(
                    view = %self.kind,
                    activity_id = %activity_id,
                    error = %e,
                    "Failed to fetch activity after membership change"
                );
                return;
            }
        };

        let mut state = self.state.lock().await;
        if self.cancel.is_cancelled() || state.generation != generation {
            return;
        }
        let ctx = self.context(&state);
        let rows = fetched.into_iter().fold(state.rows.clone(), |rows, activity| {
            apply_activity_change(&rows, ActivityChange::Upsert(activity), self.kind, &ctx)
        });
        self.replace_rows(&mut state, rows);
    }

    /// Drops rows that stopped qualifying as time passed.
    async fn sweep(&self) {
        let mut state = self.state.lock().await;
        let ctx = self.context(&state);
        let rows = retain_eligible(&state.rows, self.kind, &ctx);
        if self.replace_rows(&mut state, rows) {
            tracing::debug!(view = %self.kind, rows = state.rows.len(), "Swept expired rows");
        }
    }
}

/// Whether a membership transition can add an activity the view does not hold yet.
fn may_gain_row(kind: FeedKind, membership: &Membership) -> bool {
    kind.is_membership_scoped() || (kind == FeedKind::Browse && membership.state == MembershipState::Left)
}

async fn pump(
    core: Arc<FeedCore>,
    mut activities: Option<Subscription>,
    mut memberships: Option<Subscription>,
    mut sweep: Option<Interval>,
) {
    loop {
        tokio::select! {
            biased;
            _ = core.cancel.cancelled() => break,
            change = next_change(&mut activities) => match change {
                Some(change) => core.on_activity_change(change).await,
                None => {
                    tracing::warn!(view = %core.kind, "Activity subscription ended");
                    activities = None;
                }
            },
            change = next_change(&mut memberships) => match change {
                Some(change) => core.on_membership_change(change).await,
                None => {
                    tracing::warn!(view = %core.kind, "Membership subscription ended");
                    memberships = None;
                }
            },
            _ = next_tick(&mut sweep) => core.sweep().await,
        }
    }
    tracing::debug!(view = %core.kind, "Feed view closed");
}

/// A live, paginated feed. Closing or dropping it releases its subscriptions.
pub struct FeedView {
    core: Arc<FeedCore>,
    pump: Option<JoinHandle<()>>,
}

impl FeedView {
    /// Opens the view and loads its first page.
    ///
    /// Subscriptions start before the first fetch so that no change between
    /// the two is lost; duplicates are merged by id.
    pub async fn open(
        kind: FeedKind,
        user_id: Uuid,
        gateway: Arc<dyn Gateway>,
        realtime: Option<Arc<dyn RealtimeChannel>>,
        settings: &ViewSettings,
    ) -> Result<Self, ClientError> {
        Self::open_at(kind, user_id, gateway, realtime, settings, None).await
    }

    /// Opens the view with its first page starting after `cursor`.
    /// `refresh` still goes back to the newest rows.
    pub async fn open_after(
        kind: FeedKind,
        user_id: Uuid,
        gateway: Arc<dyn Gateway>,
        realtime: Option<Arc<dyn RealtimeChannel>>,
        settings: &ViewSettings,
        cursor: PageCursor,
    ) -> Result<Self, ClientError> {
        Self::open_at(kind, user_id, gateway, realtime, settings, Some(cursor)).await
    }

    async fn open_at(
        kind: FeedKind,
        user_id: Uuid,
        gateway: Arc<dyn Gateway>,
        realtime: Option<Arc<dyn RealtimeChannel>>,
        settings: &ViewSettings,
        start: Option<PageCursor>,
    ) -> Result<Self, ClientError> {
        let rows = gateway.list_memberships(user_id).await?;
        let (snapshots, _) = watch::channel(Arc::new(FeedSnapshot {
            kind,
            rows: Vec::new(),
            has_more: true,
            next_cursor: None,
            generation: 0,
        }));

        let core = Arc::new(FeedCore {
            kind,
            user_id,
            gateway,
            page_size: settings.page_size,
            state: Mutex::new(FeedState {
                rows: Vec::new(),
                memberships: MembershipSets::from_rows(&rows),
                next_cursor: start,
                has_more: true,
                generation: 0,
            }),
            snapshots,
            cancel: CancellationToken::new(),
        });

        let (activities, memberships) = match &realtime {
            Some(channel) => {
                let activities = channel
                    .subscribe(Topic::Activities, core.cancel.child_token())
                    .await?;
                let memberships = channel
                    .subscribe(Topic::Memberships { user_id }, core.cancel.child_token())
                    .await?;
                (Some(activities), Some(memberships))
            }
            None => (None, None),
        };

        let mut view = Self { core, pump: None };
        view.core.load_page(false).await?;

        let sweep = sweep_interval(settings.expiry_sweep);
        if activities.is_some() || sweep.is_some() {
            view.pump = Some(tokio::spawn(pump(
                view.core.clone(),
                activities,
                memberships,
                sweep,
            )));
        }

        tracing::info!(view = %kind, user_id = %user_id, realtime = realtime.is_some(), "Feed view opened");
        Ok(view)
    }

    pub fn kind(&self) -> FeedKind {
        self.core.kind
    }

    pub fn snapshot(&self) -> Arc<FeedSnapshot> {
        self.core.snapshots.borrow().clone()
    }

    /// Receiver that is notified after every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<FeedSnapshot>> {
        self.core.snapshots.subscribe()
    }

    /// Appends the next page.
    pub async fn load_more(&self) -> Result<LoadOutcome, ClientError> {
        self.core.load_page(false).await
    }

    /// Reloads memberships and the first page, replacing the rows.
    /// Pages still in flight from before are discarded.
    pub async fn refresh(&self) -> Result<LoadOutcome, ClientError> {
        self.core.load_page(true).await
    }

    pub fn is_closed(&self) -> bool {
        self.core.cancel.is_cancelled()
    }

    /// Stops all background work for the view. The last snapshot stays readable.
    pub fn close(&mut self) {
        self.core.cancel.cancel();
        self.pump.take();
    }
}

impl Drop for FeedView {
    fn drop(&mut self) {
        self.core.cancel.cancel();
    }
}
