//! Store backends for the response cache.

mod memory;

pub use memory::{MokaStore, MokaStoreConfig};
