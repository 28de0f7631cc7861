// # Key/Value Store Implementations
//
// This module provides implementations of the KeyValueStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;

use std::sync::Arc;

use crate::config::StateStoreConfig;
use crate::traits::KeyValueStore;

/// Build the key/value store described by `config`
pub async fn create_state_store(
    config: &StateStoreConfig,
) -> Result<Arc<dyn KeyValueStore>, crate::Error> {
    match config {
        StateStoreConfig::File { path } => {
            tracing::debug!("Using file state store at {}", path);
            Ok(Arc::new(FileKeyValueStore::new(path).await?))
        }
        StateStoreConfig::Memory => {
            tracing::warn!("Using in-memory state store; close events will not survive a restart");
            Ok(Arc::new(MemoryKeyValueStore::new()))
        }
    }
}
