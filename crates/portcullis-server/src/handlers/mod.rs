//! HTTP handlers.

pub mod auth;
pub mod health;
pub mod invalidate;
pub mod items;
pub mod metrics;
