//! Portcullis Server - HTTP gateway for Portcullis
//!
//! Wraps business routes with per-client rate limiting and a response cache,
//! and exposes health, metrics and cache invalidation endpoints.

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod settings;
pub mod state;
pub mod store;

pub use error::AppError;
pub use server::{create_router_with_state, run_server_with_state};
pub use settings::{Settings, SettingsError};
pub use state::AppState;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
