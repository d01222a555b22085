//! Common test utilities for integration tests.
//!
//! Every test runs against one shared in-memory store, so several users can
//! act on the same data through their own clients.

// Not every integration test uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::GatewayError;
use domain::models::{
    Activity, MemberRole, Membership, MembershipState, NewActivity, NewRoomEvent, PageCursor,
    RoomEvent,
};
use domain::ports::{ActivityFilter, Gateway, InMemoryGateway, StaticIdentity};
use fake::faker::lorem::en::Words;
use fake::Fake;
use invite_feed_client::{FeedClient, ViewSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use uuid::Uuid;

pub fn test_settings() -> ViewSettings {
    ViewSettings {
        page_size: 5,
        room_page_size: 10,
        realtime: true,
        expiry_sweep: None,
    }
}

pub fn client_for(gateway: &Arc<InMemoryGateway>, user_id: Uuid) -> FeedClient {
    client_with(gateway, user_id, test_settings())
}

pub fn client_with(
    gateway: &Arc<InMemoryGateway>,
    user_id: Uuid,
    settings: ViewSettings,
) -> FeedClient {
    FeedClient::in_memory(
        gateway.clone(),
        Arc::new(StaticIdentity(Some(user_id))),
        settings,
    )
}

/// A valid invite with a generated title.
pub fn new_activity() -> NewActivity {
    let words: Vec<String> = Words(2..5).fake();
    NewActivity {
        title: words.join(" "),
        ..Default::default()
    }
}

/// Waits until the published snapshot satisfies `pred`.
pub async fn wait_for<T, F>(rx: &mut watch::Receiver<Arc<T>>, mut pred: F) -> Arc<T>
where
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let current = rx.borrow_and_update().clone();
            if pred(&current) {
                return current;
            }
            rx.changed().await.expect("view dropped while waiting");
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

/// Gives background pumps a chance to run before asserting that nothing changed.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Store wrapper that can hold one activity page query until released.
pub struct GatedGateway {
    inner: Arc<InMemoryGateway>,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedGateway {
    pub fn new(inner: Arc<InMemoryGateway>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// The next page query blocks until [`GatedGateway::release`].
    pub fn hold_next_query(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Gateway for GatedGateway {
    async fn query_activities(
        &self,
        filter: &ActivityFilter,
        cursor: Option<&PageCursor>,
        limit: u32,
    ) -> Result<Vec<Activity>, GatewayError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.query_activities(filter, cursor, limit).await
    }

    async fn query_activities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Activity>, GatewayError> {
        self.inner.query_activities_by_ids(ids).await
    }

    async fn insert_activity(
        &self,
        creator_id: Uuid,
        input: &NewActivity,
    ) -> Result<Activity, GatewayError> {
        self.inner.insert_activity(creator_id, input).await
    }

    async fn update_activity(&self, activity: &Activity) -> Result<Activity, GatewayError> {
        self.inner.update_activity(activity).await
    }

    async fn upsert_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
        state: MembershipState,
    ) -> Result<Membership, GatewayError> {
        self.inner
            .upsert_membership(activity_id, user_id, role, state)
            .await
    }

    async fn get_membership(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, GatewayError> {
        self.inner.get_membership(activity_id, user_id).await
    }

    async fn list_memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, GatewayError> {
        self.inner.list_memberships(user_id).await
    }

    async fn count_joined_members(&self, activity_id: Uuid) -> Result<i64, GatewayError> {
        self.inner.count_joined_members(activity_id).await
    }

    async fn insert_event(&self, event: &NewRoomEvent) -> Result<RoomEvent, GatewayError> {
        self.inner.insert_event(event).await
    }

    async fn query_events_page(
        &self,
        activity_id: Uuid,
        limit: u32,
        cursor: Option<&PageCursor>,
        boundary: Option<DateTime<Utc>>,
    ) -> Result<Vec<RoomEvent>, GatewayError> {
        self.inner
            .query_events_page(activity_id, limit, cursor, boundary)
            .await
    }
}
