//! Persistence layer for the invite feed.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - The PostgreSQL gateway and LISTEN/NOTIFY push channel

pub mod db;
pub mod entities;
pub mod gateway;
pub mod metrics;
pub mod realtime;
pub mod repositories;

pub use db::{create_pool, run_migrations, DatabaseConfig};
pub use gateway::{map_sqlx_error, PostgresGateway};
pub use realtime::{PgRealtimeChannel, NOTIFY_CHANNEL};
