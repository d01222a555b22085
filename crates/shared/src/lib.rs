//! Shared utilities and common types for the invite feed.
//!
//! This crate provides common functionality used across all other crates:
//! - Opaque cursor tokens for keyset pagination
//! - Common validation logic

pub mod pagination;
pub mod validation;
