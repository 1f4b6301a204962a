//! Persistence for pending candidates, the video library and experiment
//! evaluations.

mod memory_store;
mod models;
mod schema;
mod store;

pub use memory_store::InMemoryCurationStore;
pub use models::*;
pub use schema::CURATION_VERSIONED_SCHEMAS;
pub use store::{CurationStore, SqliteCurationStore};

use crate::config::{AppConfig, StorageBackend};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Create the curation store selected by the configuration.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn CurationStore>> {
    match config.storage_backend {
        StorageBackend::Sqlite => {
            let db_path = config
                .db_path
                .as_ref()
                .context("db_path is required for the sqlite backend")?;
            info!("Opening SQLite curation database at {:?}", db_path);
            Ok(Arc::new(SqliteCurationStore::new(db_path)?))
        }
        StorageBackend::Memory => {
            info!("Using in-memory curation store (nothing is persisted)");
            Ok(Arc::new(InMemoryCurationStore::new()))
        }
    }
}
