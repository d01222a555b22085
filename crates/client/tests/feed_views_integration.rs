//! Integration tests for live feed views.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{
    client_for, client_with, new_activity, settle, test_settings, wait_for, GatedGateway,
};
use domain::models::{ActivityStatus, NewActivity};
use domain::ports::{InMemoryGateway, RawChange, StaticIdentity};
use domain::services::FeedKind;
use invite_feed_client::{FeedClient, LoadOutcome, ViewSettings};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_browse_excludes_own_and_joined_invites() {
    let gateway = Arc::new(InMemoryGateway::new());
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let alice_client = client_for(&gateway, alice);
    let bob_client = client_for(&gateway, bob);

    let own = alice_client.create_activity(&new_activity()).await.unwrap();
    let other = bob_client.create_activity(&new_activity()).await.unwrap();

    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    let snapshot = browse.snapshot();
    assert!(snapshot.contains(other.id));
    assert!(!snapshot.contains(own.id));

    let mut rx = browse.subscribe();
    alice_client.join(other.id).await.unwrap();
    wait_for(&mut rx, |s| !s.contains(other.id)).await;

    alice_client.leave(other.id).await.unwrap();
    wait_for(&mut rx, |s| s.contains(other.id)).await;
}

#[tokio::test]
async fn test_browse_receives_new_invites_from_others() {
    let gateway = Arc::new(InMemoryGateway::new());
    let alice_client = client_for(&gateway, Uuid::new_v4());
    let bob_client = client_for(&gateway, Uuid::new_v4());

    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    assert!(browse.snapshot().rows.is_empty());

    let mut rx = browse.subscribe();
    let older = bob_client.create_activity(&new_activity()).await.unwrap();
    let newer = bob_client.create_activity(&new_activity()).await.unwrap();

    let snapshot = wait_for(&mut rx, |s| s.rows.len() == 2).await;
    assert_eq!(snapshot.ids(), vec![newer.id, older.id]);
}

#[tokio::test]
async fn test_joined_and_history_follow_membership_changes() {
    let gateway = Arc::new(InMemoryGateway::new());
    let alice = Uuid::new_v4();
    let alice_client = client_for(&gateway, alice);
    let bob_client = client_for(&gateway, Uuid::new_v4());
    let invite = bob_client.create_activity(&new_activity()).await.unwrap();

    let joined = alice_client.open_feed(FeedKind::Joined).await.unwrap();
    let history = alice_client.open_feed(FeedKind::History).await.unwrap();
    assert!(joined.snapshot().rows.is_empty());
    assert!(history.snapshot().rows.is_empty());

    let mut joined_rx = joined.subscribe();
    let mut history_rx = history.subscribe();

    alice_client.join(invite.id).await.unwrap();
    wait_for(&mut joined_rx, |s| s.contains(invite.id)).await;

    alice_client.leave(invite.id).await.unwrap();
    wait_for(&mut joined_rx, |s| !s.contains(invite.id)).await;
    wait_for(&mut history_rx, |s| s.contains(invite.id)).await;
}

#[tokio::test]
async fn test_closing_an_invite_moves_it_to_history() {
    let gateway = Arc::new(InMemoryGateway::new());
    let alice_client = client_for(&gateway, Uuid::new_v4());
    let bob_client = client_for(&gateway, Uuid::new_v4());
    let invite = bob_client.create_activity(&new_activity()).await.unwrap();
    alice_client.join(invite.id).await.unwrap();

    let joined = alice_client.open_feed(FeedKind::Joined).await.unwrap();
    let history = alice_client.open_feed(FeedKind::History).await.unwrap();
    let created = bob_client.open_feed(FeedKind::Created).await.unwrap();
    assert!(joined.snapshot().contains(invite.id));
    assert!(created.snapshot().contains(invite.id));

    let mut joined_rx = joined.subscribe();
    let mut history_rx = history.subscribe();
    let mut created_rx = created.subscribe();

    let closed = bob_client.close_activity(invite.id).await.unwrap();
    assert_eq!(closed.status, ActivityStatus::Closed);

    wait_for(&mut joined_rx, |s| !s.contains(invite.id)).await;
    wait_for(&mut created_rx, |s| !s.contains(invite.id)).await;
    let snapshot = wait_for(&mut history_rx, |s| s.contains(invite.id)).await;
    assert_eq!(snapshot.rows[0].status, ActivityStatus::Closed);
}

#[tokio::test]
async fn test_created_view_shows_own_new_invite() {
    let gateway = Arc::new(InMemoryGateway::new());
    let client = client_for(&gateway, Uuid::new_v4());
    let created = client.open_feed(FeedKind::Created).await.unwrap();
    let mut rx = created.subscribe();

    let invite = client.create_activity(&new_activity()).await.unwrap();
    let snapshot = wait_for(&mut rx, |s| s.contains(invite.id)).await;
    assert_eq!(snapshot.rows.len(), 1);
}

#[tokio::test]
async fn test_pagination_is_unique_and_ordered() {
    let gateway = Arc::new(InMemoryGateway::new());
    let bob_client = client_for(&gateway, Uuid::new_v4());
    let mut created = Vec::new();
    for _ in 0..12 {
        created.push(bob_client.create_activity(&new_activity()).await.unwrap().id);
    }
    created.reverse();

    let alice_client = client_for(&gateway, Uuid::new_v4());
    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    assert_eq!(browse.snapshot().rows.len(), 5);

    assert_eq!(browse.load_more().await.unwrap(), LoadOutcome::Applied { added: 5 });
    assert_eq!(browse.load_more().await.unwrap(), LoadOutcome::Applied { added: 2 });
    assert_eq!(browse.load_more().await.unwrap(), LoadOutcome::Exhausted);

    assert_eq!(browse.snapshot().ids(), created);
}

#[tokio::test]
async fn test_feed_resumes_from_cursor_token() {
    let gateway = Arc::new(InMemoryGateway::new());
    let bob_client = client_for(&gateway, Uuid::new_v4());
    let mut created = Vec::new();
    for _ in 0..12 {
        created.push(bob_client.create_activity(&new_activity()).await.unwrap().id);
    }
    created.reverse();

    let alice_client = client_for(&gateway, Uuid::new_v4());
    let first = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    let token = first.snapshot().next_cursor.clone().unwrap();

    let resumed = alice_client
        .open_feed_after(FeedKind::Browse, &token)
        .await
        .unwrap();
    assert_eq!(resumed.snapshot().ids(), created[5..10].to_vec());

    resumed.refresh().await.unwrap();
    assert_eq!(resumed.snapshot().ids(), created[..5].to_vec());
}

#[tokio::test]
async fn test_exact_multiple_of_page_size_costs_one_empty_page() {
    let gateway = Arc::new(InMemoryGateway::new());
    let bob_client = client_for(&gateway, Uuid::new_v4());
    for _ in 0..5 {
        bob_client.create_activity(&new_activity()).await.unwrap();
    }

    let alice_client = client_for(&gateway, Uuid::new_v4());
    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    assert!(browse.snapshot().has_more);

    assert_eq!(browse.load_more().await.unwrap(), LoadOutcome::Applied { added: 0 });
    assert!(!browse.snapshot().has_more);
}

#[tokio::test]
async fn test_page_in_flight_during_refresh_is_discarded() {
    let store = Arc::new(InMemoryGateway::new());
    let bob_client = client_for(&store, Uuid::new_v4());
    for _ in 0..8 {
        bob_client.create_activity(&new_activity()).await.unwrap();
    }

    let gated = Arc::new(GatedGateway::new(store.clone()));
    let alice_client = FeedClient::new(
        gated.clone(),
        store.clone(),
        Arc::new(StaticIdentity(Some(Uuid::new_v4()))),
        test_settings(),
    );
    let browse = Arc::new(alice_client.open_feed(FeedKind::Browse).await.unwrap());

    gated.hold_next_query();
    let pending = {
        let browse = browse.clone();
        tokio::spawn(async move { browse.load_more().await })
    };
    gated.wait_until_held().await;

    assert_eq!(browse.refresh().await.unwrap(), LoadOutcome::Applied { added: 5 });
    gated.release();

    assert_eq!(pending.await.unwrap().unwrap(), LoadOutcome::Discarded);
    let snapshot = browse.snapshot();
    assert_eq!(snapshot.rows.len(), 5);
    assert_eq!(snapshot.generation, 1);
}

#[tokio::test]
async fn test_page_in_flight_during_join_skips_joined_invite() {
    let store = Arc::new(InMemoryGateway::new());
    let bob_client = client_for(&store, Uuid::new_v4());
    let mut invites = Vec::new();
    for _ in 0..6 {
        invites.push(bob_client.create_activity(&new_activity()).await.unwrap());
    }
    let oldest = invites[0].id;

    let gated = Arc::new(GatedGateway::new(store.clone()));
    let alice_client = FeedClient::new(
        gated.clone(),
        store.clone(),
        Arc::new(StaticIdentity(Some(Uuid::new_v4()))),
        test_settings(),
    );
    let browse = Arc::new(alice_client.open_feed(FeedKind::Browse).await.unwrap());
    assert!(!browse.snapshot().contains(oldest));

    gated.hold_next_query();
    let pending = {
        let browse = browse.clone();
        tokio::spawn(async move { browse.load_more().await })
    };
    gated.wait_until_held().await;

    alice_client.join(oldest).await.unwrap();
    settle().await;
    gated.release();

    assert_eq!(
        pending.await.unwrap().unwrap(),
        LoadOutcome::Applied { added: 0 }
    );
    let snapshot = browse.snapshot();
    assert!(!snapshot.contains(oldest));
    assert_eq!(snapshot.rows.len(), 5);
}

#[tokio::test]
async fn test_close_releases_subscriptions() {
    let gateway = Arc::new(InMemoryGateway::new());
    let client = client_for(&gateway, Uuid::new_v4());
    let invite = client.create_activity(&new_activity()).await.unwrap();

    let mut browse = client.open_feed(FeedKind::Browse).await.unwrap();
    let room = client.open_room(invite.id).await.unwrap();
    assert_eq!(gateway.subscriber_count().await, 4);

    browse.close();
    assert!(browse.is_closed());
    assert_eq!(gateway.subscriber_count().await, 2);

    drop(room);
    assert_eq!(gateway.subscriber_count().await, 0);

    // Closed views ignore later pushes and page requests.
    let before = browse.snapshot();
    client_for(&gateway, Uuid::new_v4())
        .create_activity(&new_activity())
        .await
        .unwrap();
    settle().await;
    assert_eq!(browse.snapshot(), before);
    assert_eq!(browse.load_more().await.unwrap(), LoadOutcome::Discarded);
}

#[tokio::test]
async fn test_malformed_push_is_dropped() {
    let gateway = Arc::new(InMemoryGateway::new());
    let alice_client = client_for(&gateway, Uuid::new_v4());
    let bob_client = client_for(&gateway, Uuid::new_v4());
    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    let mut rx = browse.subscribe();

    gateway
        .emit_raw("activities", RawChange::insert(json!({ "id": "not-a-uuid" })))
        .await;
    gateway
        .emit_raw("activities", RawChange::delete(json!({ "title": "no id" })))
        .await;
    let invite = bob_client.create_activity(&new_activity()).await.unwrap();

    let snapshot = wait_for(&mut rx, |s| s.contains(invite.id)).await;
    assert_eq!(snapshot.ids(), vec![invite.id]);
}

#[tokio::test]
async fn test_replayed_push_is_idempotent() {
    let gateway = Arc::new(InMemoryGateway::new());
    let alice_client = client_for(&gateway, Uuid::new_v4());
    let bob_client = client_for(&gateway, Uuid::new_v4());
    let invite = bob_client.create_activity(&new_activity()).await.unwrap();

    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    let before = browse.snapshot();

    gateway
        .emit_raw(
            "activities",
            RawChange::insert(serde_json::to_value(&invite).unwrap()),
        )
        .await;
    settle().await;
    assert_eq!(browse.snapshot().rows, before.rows);
}

#[tokio::test]
async fn test_hard_delete_removes_row() {
    let gateway = Arc::new(InMemoryGateway::new());
    let alice_client = client_for(&gateway, Uuid::new_v4());
    let bob_client = client_for(&gateway, Uuid::new_v4());
    let invite = bob_client.create_activity(&new_activity()).await.unwrap();

    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    let mut rx = browse.subscribe();
    assert!(browse.snapshot().contains(invite.id));

    gateway.delete_activity(invite.id).await;
    wait_for(&mut rx, |s| !s.contains(invite.id)).await;
}

#[tokio::test]
async fn test_expiry_sweep_drops_expired_rows() {
    let gateway = Arc::new(InMemoryGateway::new());
    let bob_client = client_for(&gateway, Uuid::new_v4());
    let invite = bob_client
        .create_activity(&NewActivity {
            expires_at: Some(Utc::now() + ChronoDuration::milliseconds(300)),
            ..new_activity()
        })
        .await
        .unwrap();

    let alice_client = client_with(
        &gateway,
        Uuid::new_v4(),
        ViewSettings {
            expiry_sweep: Some(Duration::from_millis(50)),
            ..test_settings()
        },
    );
    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    assert!(browse.snapshot().contains(invite.id));

    let mut rx = browse.subscribe();
    wait_for(&mut rx, |s| !s.contains(invite.id)).await;
}

#[tokio::test]
async fn test_realtime_disabled_needs_refresh() {
    let gateway = Arc::new(InMemoryGateway::new());
    let alice_client = client_with(
        &gateway,
        Uuid::new_v4(),
        ViewSettings {
            realtime: false,
            ..test_settings()
        },
    );
    let bob_client = client_for(&gateway, Uuid::new_v4());

    let browse = alice_client.open_feed(FeedKind::Browse).await.unwrap();
    assert_eq!(gateway.subscriber_count().await, 0);

    let invite = bob_client.create_activity(&new_activity()).await.unwrap();
    settle().await;
    assert!(!browse.snapshot().contains(invite.id));

    browse.refresh().await.unwrap();
    assert!(browse.snapshot().contains(invite.id));
}

#[tokio::test]
async fn test_membership_scoped_views_skip_store_without_memberships() {
    let gateway = Arc::new(InMemoryGateway::new());
    let client = client_for(&gateway, Uuid::new_v4());

    let joined = client.open_feed(FeedKind::Joined).await.unwrap();
    let history = client.open_feed(FeedKind::History).await.unwrap();

    assert!(joined.snapshot().rows.is_empty());
    assert!(!history.snapshot().has_more);
    // One membership lookup per view and no activity query.
    assert_eq!(gateway.query_count().await, 2);
}
