//! Live view of one activity's room.
//!
//! The view follows the member's own membership row: once they leave, events
//! created after `left_at` are neither merged nor kept.

use chrono::{DateTime, Utc};
use domain::models::{Activity, Membership, MembershipState, PageCursor, QuickStatus, RoomEvent};
use domain::ports::{ChangeType, RawChange, RealtimeChannel, Subscription, Topic};
use domain::services::{merge_events, parse_event_change, RoomAccess, RoomService};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{next_change, LoadOutcome, ViewSettings};
use crate::error::ClientError;

/// What a room view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub activity: Activity,
    pub membership: Membership,
    /// Oldest first, unique by id.
    pub events: Vec<RoomEvent>,
    pub has_older: bool,
    pub generation: u64,
}

#[derive(Debug)]
struct RoomState {
    membership: Membership,
    /// Newest visible event time once the member has left.
    left_at: Option<DateTime<Utc>>,
    events: Vec<RoomEvent>,
    older_cursor: Option<PageCursor>,
    has_older: bool,
    generation: u64,
}

struct RoomCore {
    access: RoomAccess,
    rooms: RoomService,
    page_size: u32,
    state: Mutex<RoomState>,
    snapshots: watch::Sender<Arc<RoomSnapshot>>,
    cancel: CancellationToken,
}

impl RoomCore {
    fn activity_id(&self) -> Uuid {
        self.access.activity.id
    }

    fn publish(&self, state: &RoomState) {
        self.snapshots.send_replace(Arc::new(RoomSnapshot {
            activity: self.access.activity.clone(),
            membership: state.membership.clone(),
            events: state.events.clone(),
            has_older: state.has_older,
            generation: state.generation,
        }));
    }

    fn visible(&self, state: &RoomState, event: &RoomEvent) -> bool {
        self.access
            .boundary
            .map_or(true, |boundary| event.created_at >= boundary)
            && state.left_at.map_or(true, |left_at| event.created_at <= left_at)
    }

    fn visible_events(&self, state: &RoomState, events: &[RoomEvent]) -> Vec<RoomEvent> {
        events
            .iter()
            .filter(|e| self.visible(state, e))
            .cloned()
            .collect()
    }

    async fn merge(&self, incoming: &[RoomEvent]) {
        let mut state = self.state.lock().await;
        if self.cancel.is_cancelled() {
            return;
        }
        let incoming = self.visible_events(&state, incoming);
        if incoming.is_empty() {
            return;
        }
        let events = merge_events(&state.events, &incoming);
        if events != state.events {
            state.events = events;
            self.publish(&state);
        }
    }

    async fn load_page(&self, reset: bool) -> Result<LoadOutcome, ClientError> {
        if self.cancel.is_cancelled() {
            return Ok(LoadOutcome::Discarded);
        }

        let (generation, cursor) = {
            let mut state = self.state.lock().await;
            if reset {
                state.generation += 1;
            } else if !state.has_older {
                return Ok(LoadOutcome::Exhausted);
            }
            let cursor = if reset { None } else { state.older_cursor };
            (state.generation, cursor)
        };

        let page = self
            .rooms
            .events_page(&self.access, self.page_size, cursor.as_ref())
            .await?;

        let mut state = self.state.lock().await;
        if self.cancel.is_cancelled() || state.generation != generation {
            tracing::debug!(
                activity_id = %self.activity_id(),
                requested = generation,
                current = state.generation,
                "Discarding stale room page"
            );
            return Ok(LoadOutcome::Discarded);
        }

        let before = if reset { 0 } else { state.events.len() };
        let rows = self.visible_events(&state, &page.rows);
        state.events = if reset {
            merge_events(&[], &rows)
        } else {
            merge_events(&state.events, &rows)
        };
        state.older_cursor = page.next_cursor;
        state.has_older = page.has_more;
        self.publish(&state);

        Ok(LoadOutcome::Applied {
            added: state.events.len().saturating_sub(before),
        })
    }

    async fn on_event_change(&self, change: RawChange) {
        if let Some(event) = parse_event_change(&change, self.activity_id()) {
            self.merge(std::slice::from_ref(&event)).await;
        }
    }

    async fn on_membership_change(&self, change: RawChange) {
        if change.event_type == ChangeType::Delete {
            return;
        }
        let Some(row) = change.row().cloned() else {
            return;
        };
        let membership = match serde_json::from_value::<Membership>(row) {
            Ok(membership) => membership,
            Err(e) => {
                tracing::warn!(
                    activity_id = %self.activity_id(),
                    error = %e,
                    "Dropping malformed membership change"
                );
                return;
            }
        };
        if membership.activity_id != self.activity_id()
            || membership.user_id != self.access.membership.user_id
        {
            return;
        }

        let mut state = self.state.lock().await;
        if self.cancel.is_cancelled() || membership == state.membership {
            return;
        }
        // A rejoin opens a new window that this view does not cover.
        if membership.state == MembershipState::Left && state.left_at.is_none() {
            state.left_at = Some(membership.left_at.unwrap_or_else(Utc::now));
            state.has_older = false;
            let events = self.visible_events(&state, &state.events);
            state.events = events;
            tracing::info!(
                activity_id = %self.activity_id(),
                user_id = %membership.user_id,
                "Member left, room view frozen"
            );
        }
        state.membership = membership;
        self.publish(&state);
    }
}

async fn pump(
    core: Arc<RoomCore>,
    mut events: Option<Subscription>,
    mut memberships: Option<Subscription>,
) {
    loop {
        tokio::select! {
            biased;
            _ = core.cancel.cancelled() => break,
            change = next_change(&mut memberships) => match change {
                Some(change) => core.on_membership_change(change).await,
                None => {
                    tracing::warn!(activity_id = %core.activity_id(), "Membership subscription ended");
                    memberships = None;
                }
            },
            change = next_change(&mut events) => match change {
                Some(change) => core.on_event_change(change).await,
                None => {
                    tracing::warn!(activity_id = %core.activity_id(), "Room subscription ended");
                    break;
                }
            },
        }
    }
    tracing::debug!(activity_id = %core.activity_id(), "Room view closed");
}

/// A joined member's live view of a room.
pub struct RoomView {
    core: Arc<RoomCore>,
    pump: Option<JoinHandle<()>>,
}

impl RoomView {
    /// Checks access, subscribes to new events and loads the latest page.
    pub async fn open(
        rooms: RoomService,
        realtime: Option<Arc<dyn RealtimeChannel>>,
        activity_id: Uuid,
        user_id: Uuid,
        settings: &ViewSettings,
    ) -> Result<Self, ClientError> {
        let access = rooms.open(activity_id, user_id).await?;
        let (snapshots, _) = watch::channel(Arc::new(RoomSnapshot {
            activity: access.activity.clone(),
            membership: access.membership.clone(),
            events: Vec::new(),
            has_older: true,
            generation: 0,
        }));

        let membership = access.membership.clone();
        let core = Arc::new(RoomCore {
            access,
            rooms,
            page_size: settings.room_page_size,
            state: Mutex::new(RoomState {
                membership,
                left_at: None,
                events: Vec::new(),
                older_cursor: None,
                has_older: true,
                generation: 0,
            }),
            snapshots,
            cancel: CancellationToken::new(),
        });

        let (events, memberships) = match &realtime {
            Some(channel) => {
                let events = channel
                    .subscribe(Topic::RoomEvents { activity_id }, core.cancel.child_token())
                    .await?;
                let memberships = channel
                    .subscribe(Topic::Memberships { user_id }, core.cancel.child_token())
                    .await?;
                (Some(events), Some(memberships))
            }
            None => (None, None),
        };

        let mut view = Self { core, pump: None };
        view.core.load_page(false).await?;

        if events.is_some() {
            view.pump = Some(tokio::spawn(pump(view.core.clone(), events, memberships)));
        }

        tracing::info!(
            activity_id = %activity_id,
            user_id = %user_id,
            bounded = view.core.access.boundary.is_some(),
            "Room view opened"
        );
        Ok(view)
    }

    pub fn activity_id(&self) -> Uuid {
        self.core.activity_id()
    }

    pub fn snapshot(&self) -> Arc<RoomSnapshot> {
        self.core.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RoomSnapshot>> {
        self.core.snapshots.subscribe()
    }

    /// Prepends the next older page.
    pub async fn load_older(&self) -> Result<LoadOutcome, ClientError> {
        self.core.load_page(false).await
    }

    /// Reloads the latest page, replacing the events.
    pub async fn refresh(&self) -> Result<LoadOutcome, ClientError> {
        self.core.load_page(true).await
    }

    /// Posts a chat message and shows it without waiting for the push echo.
    pub async fn send_chat(&self, text: &str) -> Result<RoomEvent, ClientError> {
        let access = &self.core.access;
        let event = self
            .core
            .rooms
            .send_chat(access.activity.id, access.membership.user_id, text)
            .await?;
        self.core.merge(std::slice::from_ref(&event)).await;
        Ok(event)
    }

    pub async fn send_quick(&self, status: QuickStatus) -> Result<RoomEvent, ClientError> {
        let access = &self.core.access;
        let event = self
            .core
            .rooms
            .send_quick(access.activity.id, access.membership.user_id, status)
            .await?;
        self.core.merge(std::slice::from_ref(&event)).await;
        Ok(event)
    }

    pub fn is_closed(&self) -> bool {
        self.core.cancel.is_cancelled()
    }

    pub fn close(&mut self) {
        self.core.cancel.cancel();
        self.pump.take();
    }
}

impl Drop for RoomView {
    fn drop(&mut self) {
        self.core.cancel.cancel();
    }
}
