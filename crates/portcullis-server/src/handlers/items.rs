//! Sample catalog routes served behind the gateway layers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{Path, State},
    http::Method,
    response::Json,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub price_cents: u64,
}

/// Fields accepted by `POST /api/items/{id}`.
#[derive(Debug, Deserialize)]
pub struct ItemUpdate {
    pub name: String,
    pub price_cents: u64,
}

/// In-memory item store.
#[derive(Debug, Default)]
pub struct ItemCatalog {
    items: RwLock<BTreeMap<u64, Item>>,
    reads: AtomicU64,
}

impl ItemCatalog {
    pub fn with_samples() -> Self {
        let catalog = Self::default();
        let samples = [(1, "Lantern", 2_499), (2, "Rope", 899), (3, "Compass", 1_550)];
        for (id, name, price_cents) in samples {
            catalog.upsert(Item {
                id,
                name: name.to_string(),
                price_cents,
            });
        }
        catalog
    }

    pub fn list(&self) -> Vec<Item> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.items.read().values().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<Item> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.items.read().get(&id).cloned()
    }

    pub fn upsert(&self, item: Item) {
        self.items.write().insert(item.id, item);
    }

    /// Number of list/get calls served, i.e. requests that reached a handler.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

/// GET /api/items
pub async fn list_items(State(state): State<AppState>) -> Json<Vec<Item>> {
    Json(state.catalog().list())
}

/// GET /api/items/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Item>, AppError> {
    state
        .catalog()
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Item {id} not found")))
}

/// POST /api/items/{id}
/// Guarda el item e invalida sus respuestas cacheadas.
#[instrument(skip_all, fields(id = id))]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<ItemUpdate>,
) -> Result<Json<Item>, AppError> {
    if update.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }

    let item = Item {
        id,
        name: update.name,
        price_cents: update.price_cents,
    };
    state.catalog().upsert(item.clone());

    if let Some(cache) = state.cache() {
        let item_path = format!("/api/items/{id}");
        let by_id = cache.invalidate_route(&Method::GET, &item_path).await;
        let listing = cache.invalidate_route(&Method::GET, "/api/items").await;
        info!(
            invalidated = by_id.count + listing.count,
            "Item updated, cached responses invalidated"
        );
    }

    Ok(Json(item))
}
