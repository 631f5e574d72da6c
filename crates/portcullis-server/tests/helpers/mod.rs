//! Test helpers para portcullis-server.

#![allow(dead_code, unused_imports)]

pub mod assertions;
pub mod client;

pub use assertions::*;
pub use client::{TestClient, TestResponse, app_with, cache_only_settings, client};
