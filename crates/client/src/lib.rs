//! Client library for the invite feed.
//!
//! This crate contains:
//! - Configuration loading and logging initialization
//! - The client error taxonomy
//! - `FeedClient`, the per-session facade over the store
//! - Live `FeedView` and `RoomView` objects

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod views;

pub use config::Config;
pub use error::ClientError;
pub use session::FeedClient;
pub use views::{FeedSnapshot, FeedView, LoadOutcome, RoomSnapshot, RoomView, ViewSettings};
