//! LISTEN/NOTIFY push channel.
//!
//! Triggers on the feed tables publish `{table, event_type, new, old}` JSON on
//! [`NOTIFY_CHANNEL`]. Each subscription owns one listener connection and a
//! task that forwards matching changes until the subscription is cancelled.

use async_trait::async_trait;
use domain::ports::{RawChange, RealtimeChannel, Subscription, Topic};
use domain::GatewayError;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::gateway::map_sqlx_error;
use crate::metrics::record_change_forwarded;

pub const NOTIFY_CHANNEL: &str = "invite_changes";

#[derive(Debug, Deserialize)]
struct Notification {
    table: String,
    #[serde(flatten)]
    change: RawChange,
}

/// Decodes a notification payload into its table name and change.
pub fn parse_notification(payload: &str) -> Option<(String, RawChange)> {
    match serde_json::from_str::<Notification>(payload) {
        Ok(notification) => Some((notification.table, notification.change)),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable change notification");
            None
        }
    }
}

#[derive(Clone)]
pub struct PgRealtimeChannel {
    pool: PgPool,
}

impl PgRealtimeChannel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RealtimeChannel for PgRealtimeChannel {
    async fn subscribe(
        &self,
        topic: Topic,
        cancel: CancellationToken,
    ) -> Result<Subscription, GatewayError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        listener
            .listen(NOTIFY_CHANNEL)
            .await
            .map_err(map_sqlx_error)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let token = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = listener.recv() => match received {
                        Ok(notification) => {
                            let Some((table, change)) = parse_notification(notification.payload()) else {
                                continue;
                            };
                            if !topic.matches(&table, &change) {
                                continue;
                            }
                            if sender.send(change).is_err() {
                                break;
                            }
                            record_change_forwarded(&table);
                        }
                        Err(e) => {
                            tracing::warn!(topic = %topic, error = %e, "Change listener failed, ending subscription");
                            token.cancel();
                            break;
                        }
                    }
                }
            }
            tracing::debug!(topic = %topic, "Change listener stopped");
        });

        tracing::debug!(topic = %topic, "Subscribed to change notifications");
        Ok(Subscription::new(topic, receiver, cancel))
    }
}
