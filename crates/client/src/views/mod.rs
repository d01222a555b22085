//! Scoped, live views over the store.
//!
//! Each view owns a cancellation token, the push subscriptions it opened and
//! a pump task that folds pushed changes into its snapshot. Closing or
//! dropping the view cancels all of them.

pub mod feed;
pub mod room;

use domain::ports::{RawChange, Subscription};
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::Config;

pub use feed::{FeedSnapshot, FeedView};
pub use room::{RoomSnapshot, RoomView};

/// Result of a page request on a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was merged; `added` rows were new to the view.
    Applied { added: usize },
    /// The view was refreshed or closed while the page was in flight.
    Discarded,
    /// The previous page was the last one; nothing was fetched.
    Exhausted,
}

/// Knobs shared by every view a client opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    pub page_size: u32,
    pub room_page_size: u32,
    pub realtime: bool,
    pub expiry_sweep: Option<Duration>,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            page_size: 20,
            room_page_size: 50,
            realtime: true,
            expiry_sweep: Some(Duration::from_secs(30)),
        }
    }
}

impl ViewSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.feed.page_size,
            room_page_size: config.feed.room_page_size,
            realtime: config.realtime.enabled,
            expiry_sweep: config.feed.expiry_sweep(),
        }
    }
}

/// Next change from an optional subscription; pends forever when there is none.
pub(crate) async fn next_change(subscription: &mut Option<Subscription>) -> Option<RawChange> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

pub(crate) fn sweep_interval(period: Option<Duration>) -> Option<Interval> {
    period.map(|period| {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

pub(crate) async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
