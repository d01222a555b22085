//! Domain layer for the invite feed.
//!
//! This crate contains:
//! - Domain models (Activity, Membership, RoomEvent, InviteEdit)
//! - Ports to the external store and push channel
//! - Feed services: eligibility, pagination, reconciliation, membership, room log
//! - Domain error types

pub mod error;
pub mod models;
pub mod ports;
pub mod services;

pub use error::{DomainError, GatewayError};
