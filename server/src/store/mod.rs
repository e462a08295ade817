//! Schema store selection.

mod rest;

pub use rest::RestSchemaStore;

use crate::config::StoreConfig;
use converge_engine::{MemoryStore, SchemaStore};
use std::sync::Arc;

/// Build the store the server reconciles against.
///
/// Without a configured remote store the server falls back to an in-process
/// [`MemoryStore`], which starts empty on every boot.
pub fn connect(config: Option<&StoreConfig>) -> Arc<dyn SchemaStore> {
    match config {
        Some(config) => {
            tracing::info!(url = %config.url, "using remote schema store");
            Arc::new(RestSchemaStore::new(config))
        }
        None => {
            tracing::warn!("STORE_URL not set, reconciling against an in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}
