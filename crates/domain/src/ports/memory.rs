//! In-memory gateway for tests and local development.
//!
//! Behaves like the PostgreSQL implementation: keyset ordering, membership
//! upsert semantics and change notifications for every write.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    ActivityFilter, ChangeType, Gateway, RawChange, RealtimeChannel, Subscription, Topic,
};
use crate::error::GatewayError;
use crate::models::{
    Activity, ActivityStatus, MemberRole, Membership, MembershipState, NewActivity, NewRoomEvent,
    PageCursor, RoomEvent,
};

#[derive(Debug, Default)]
struct State {
    activities: HashMap<Uuid, Activity>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
    events: Vec<RoomEvent>,
    last_timestamp: Option<DateTime<Utc>>,
    fail_event_inserts: bool,
    fail_queries: bool,
    query_count: usize,
}

impl State {
    /// Strictly increasing timestamps at the store's microsecond precision.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn check_queries(&mut self) -> Result<(), GatewayError> {
        if self.fail_queries {
            return Err(GatewayError::Transient("simulated query failure".to_string()));
        }
        self.query_count += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct Subscriber {
    topic: Topic,
    sender: mpsc::UnboundedSender<RawChange>,
    cancel: CancellationToken,
}

/// Gateway and push channel backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an activity row as is, notifying subscribers.
    pub async fn put_activity(&self, activity: Activity) {
        let mut state = self.state.lock().await;
        let old = state.activities.insert(activity.id, activity.clone());
        let change = match old {
            Some(old) => row_change(ChangeType::Update, Some(&activity), Some(&old)),
            None => row_change(ChangeType::Insert, Some(&activity), None),
        };
        drop(state);
        self.publish("activities", change).await;
    }

    /// Inserts or replaces a membership row as is, notifying subscribers.
    pub async fn put_membership(&self, membership: Membership) {
        let mut state = self.state.lock().await;
        let key = (membership.activity_id, membership.user_id);
        let old = state.memberships.insert(key, membership.clone());
        let change = match old {
            Some(old) => row_change(ChangeType::Update, Some(&membership), Some(&old)),
            None => row_change(ChangeType::Insert, Some(&membership), None),
        };
        drop(state);
        self.publish("memberships", change).await;
    }

    /// Hard-deletes an activity. Only administrative tooling does this.
    pub async fn delete_activity(&self, id: Uuid) -> Option<Activity> {
        let removed = self.state.lock().await.activities.remove(&id);
        if let Some(old) = &removed {
            let change = row_change(ChangeType::Delete, None, Some(old));
            self.publish("activities", change).await;
        }
        removed
    }

    /// Delivers an arbitrary change to subscribers of `table`.
    pub async fn emit_raw(&self, table: &str, change: RawChange) {
        self.publish(table, Some(change)).await;
    }

    pub async fn fail_event_inserts(&self, fail: bool) {
        self.state.lock().await.fail_event_inserts = fail;
    }

    pub async fn fail_queries(&self, fail: bool) {
        self.state.lock().await.fail_queries = fail;
    }

    /// Number of read queries served so far.
    pub async fn query_count(&self) -> usize {
        self.state.lock().await.query_count
    }

    pub async fn activity(&self, id: Uuid) -> Option<Activity> {
        self.state.lock().await.activities.get(&id).cloned()
    }

    /// All events of an activity, oldest first.
    pub async fn events_for(&self, activity_id: Uuid) -> Vec<RoomEvent> {
        let state = self.state.lock().await;
        let mut events: Vec<RoomEvent> = state
            .events
            .iter()
            .filter(|e| e.activity_id == activity_id)
            .cloned()
            .collect();
        events.sort_by_key(RoomEvent::cursor);
        events
    }

    /// Subscriptions that are still listening.
    pub async fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|s| !s.cancel.is_cancelled() && !s.sender.is_closed());
        subscribers.len()
    }

    async fn publish(&self, table: &str, change: Option<RawChange>) {
        let Some(change) = change else {
            return;
        };
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|s| !s.cancel.is_cancelled() && !s.sender.is_closed());
        for subscriber in subscribers.iter() {
            if subscriber.topic.matches(table, &change) {
                // A receiver dropped since the retain above is pruned next time.
                let _ = subscriber.sender.send(change.clone());
            }
        }
    }
}

fn to_row<T: Serialize>(row: &T) -> Option<JsonValue> {
    match serde_json::to_value(row) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize row for change notification");
            None
        }
    }
}

fn row_change<T: Serialize>(
    event_type: ChangeType,
    new: Option<&T>,
    old: Option<&T>,
) -> Option<RawChange> {
    let new = match new {
        Some(row) => Some(to_row(row)?),
        None => None,
    };
    let old = match old {
        Some(row) => Some(to_row(row)?),
        None => None,
    };
    Some(RawChange {
        event_type,
        new,
        old,
    })
}

fn sorted_newest_first(mut rows: Vec<Activity>) -> Vec<Activity> {
    rows.sort_by(|a, b| b.cursor().cmp(&a.cursor()));
    rows
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn query_activities(
        &self,
        filter: &ActivityFilter,
        cursor: Option<&PageCursor>,
        limit: u32,
    ) -> Result<Vec<Activity>, GatewayError> {
        let mut state = self.state.lock().await;
        state.check_queries()?;

        let rows = state
            .activities
            .values()
            .filter(|a| filter.matches(a))
            .filter(|a| cursor.map_or(true, |c| a.cursor() < *c))
            .cloned()
            .collect();

        Ok(sorted_newest_first(rows)
            .into_iter()
            .take(limit as usize)
            .collect())
    }

    async fn query_activities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Activity>, GatewayError> {
        let mut state = self.state.lock().await;
        state.check_queries()?;

        let rows = ids
            .iter()
            .filter_map(|id| state.activities.get(id))
            .cloned()
            .collect();
        Ok(sorted_newest_first(rows))
    }

    async fn insert_activity(
        &self,
        creator_id: Uuid,
        input: &NewActivity,
    ) -> Result<Activity, GatewayError> {
        let mut state = self.state.lock().await;
        let created_at = state.tick();

        let activity = Activity {
            id: Uuid::new_v4(),
            creator_id,
            title: input.title.trim().to_string(),
            place: input.place.clone(),
            gender_pref: input.gender_pref,
            capacity: input.capacity,
            status: ActivityStatus::Open,
            expires_at: input.expires_at,
            start_time: input.start_time,
            end_time: input.end_time,
            created_at,
        };
        let membership = Membership {
            activity_id: activity.id,
            user_id: creator_id,
            role: MemberRole::Creator,
            state: MembershipState::Joined,
            joined_at: created_at,
            left_at: None,
        };

        state.activities.insert(activity.id, activity.clone());
        state
            .memberships
            .insert((activity.id, creator_id), membership.clone());
        drop(state);

        self.publish(
            "activities",
            row_change(ChangeType::Insert, Some(&activity), None),
        )
        .await;
        self.publish(
            "memberships",
            row_change(ChangeType::Insert, Some(&membership), None),
        )
        .await;

        Ok(activity)
    }

    async fn update_activity(&self, activity: &Activity) -> Result<Activity, GatewayError> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.activities.get_mut(&activity.id) else {
            return Err(GatewayError::NotFound(format!("activity {}", activity.id)));
        };

        let old = stored.clone();
        *stored = Activity {
            id: old.id,
            creator_id: old.creator_id,
            created_at: old.created_at,
            ..activity.clone()
        };
        let updated = stored.clone();
        drop(state);

        self.publish(
            "activities",
            row_change(ChangeType::Update, Some(&updated), Some(&old)),
        )
        .await;
        Ok(updated)
    }

    async fn upsert_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
        membership_state: MembershipState,
    ) -> Result<Membership, GatewayError> {
        let mut state = self.state.lock().await;
        if !state.activities.contains_key(&activity_id) {
            return Err(GatewayError::NotFound(format!("activity {}", activity_id)));
        }
        let now = state.tick();

        let old = state.memberships.get(&(activity_id, user_id)).cloned();
        let membership = match &old {
            Some(existing) => {
                let mut row = existing.clone();
                if !existing.is_creator() {
                    row.role = role;
                }
                row.state = membership_state;
                match membership_state {
                    MembershipState::Joined => row.joined_at = now,
                    MembershipState::Left => row.left_at = Some(now),
                }
                row
            }
            None => Membership {
                activity_id,
                user_id,
                role,
                state: membership_state,
                joined_at: now,
                left_at: (membership_state == MembershipState::Left).then_some(now),
            },
        };

        state
            .memberships
            .insert((activity_id, user_id), membership.clone());
        drop(state);

        let change = match &old {
            Some(old) => row_change(ChangeType::Update, Some(&membership), Some(old)),
            None => row_change(ChangeType::Insert, Some(&membership), None),
        };
        self.publish("memberships", change).await;
        Ok(membership)
    }

    async fn get_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, GatewayError> {
        let mut state = self.state.lock().await;
        state.check_queries()?;
        Ok(state.memberships.get(&(activity_id, user_id)).cloned())
    }

    async fn list_memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, GatewayError> {
        let mut state = self.state.lock().await;
        state.check_queries()?;

        let mut rows: Vec<Membership> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(rows)
    }

    async fn count_joined_members(&self, activity_id: Uuid) -> Result<i64, GatewayError> {
        let mut state = self.state.lock().await;
        state.check_queries()?;

        let count = state
            .memberships
            .values()
            .filter(|m| m.activity_id == activity_id && m.is_joined() && !m.is_creator())
            .count();
        Ok(count as i64)
    }

    async fn insert_event(&self, event: &NewRoomEvent) -> Result<RoomEvent, GatewayError> {
        let mut state = self.state.lock().await;
        if state.fail_event_inserts {
            return Err(GatewayError::Transient(
                "simulated event insert failure".to_string(),
            ));
        }
        if !state.activities.contains_key(&event.activity_id) {
            return Err(GatewayError::NotFound(format!(
                "activity {}",
                event.activity_id
            )));
        }

        let stored = RoomEvent {
            id: Uuid::new_v4(),
            activity_id: event.activity_id,
            user_id: event.user_id,
            event_type: event.event_type,
            content: event.content.clone(),
            created_at: state.tick(),
        };
        state.events.push(stored.clone());
        drop(state);

        self.publish(
            "room_events",
            row_change(ChangeType::Insert, Some(&stored), None),
        )
        .await;
        Ok(stored)
    }

    async fn query_events_page(
        &self,
        activity_id: Uuid,
        limit: u32,
        cursor: Option<&PageCursor>,
        boundary: Option<DateTime<Utc>>,
    ) -> Result<Vec<RoomEvent>, GatewayError> {
        let mut state = self.state.lock().await;
        state.check_queries()?;

        let mut rows: Vec<RoomEvent> = state
            .events
            .iter()
            .filter(|e| e.activity_id == activity_id)
            .filter(|e| cursor.map_or(true, |c| e.cursor() < *c))
            .filter(|e| boundary.map_or(true, |b| e.created_at >= b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.cursor().cmp(&a.cursor()));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[async_trait]
impl RealtimeChannel for InMemoryGateway {
    async fn subscribe(
        &self,
        topic: Topic,
        cancel: CancellationToken,
    ) -> Result<Subscription, GatewayError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(Subscriber {
            topic,
            sender,
            cancel: cancel.clone(),
        });
        tracing::debug!(topic = %topic, "In-memory subscription registered");
        Ok(Subscription::new(topic, receiver, cancel))
    }
}
