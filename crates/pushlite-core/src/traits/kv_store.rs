// # Key/Value Store Trait
//
// Defines the interface for the durable storage the device profile lives in.
//
// ## Purpose
//
// The store is the only thing that survives a process restart. It holds:
// - The device identity and push token
// - Tags and attributes awaiting registration
// - The single pending close event awaiting delivery
//
// ## Implementations
//
// - In-memory: `MemoryKeyValueStore` (tests, ephemeral hosts)
// - File-based: `FileKeyValueStore` (single JSON document, atomic writes)
//
// ## Usage
//
// ```rust,ignore
// use pushlite_core::KeyValueStore;
//
// let store = /* KeyValueStore implementation */;
// store.set("com.pushlite.tags", serde_json::json!(["a", "b"])).await?;
// let tags = store.get("com.pushlite.tags").await?;
// ```

use async_trait::async_trait;

/// Trait for durable key/value store implementations
///
/// Values are JSON documents; the profile store decides how each field is
/// encoded.
///
/// # Durability
///
/// `set` and `remove` must not return until the change is committed to the
/// backing medium. A process kill immediately after a successful write must
/// not lose that write. Implementations may not buffer writes.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// The coordinator serializes its own access, but hosts may share a store.
///
/// ## Forbidden Capabilities
/// - ❌ Spawn background tasks (no deferred flushing)
/// - ❌ Interpret values (owned by `DeviceProfileStore`)
/// - ❌ Perform network calls (owned by `SyncClient`)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: The stored value
    /// - `Ok(None)`: No value stored under `key`
    /// - `Err(Error)`: Storage error
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, crate::Error>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), crate::Error>;

    /// Remove a value (no-op if absent)
    async fn remove(&self, key: &str) -> Result<(), crate::Error>;

    /// List all keys in the store
    async fn keys(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Writes are already durable when `set`/`remove` return; this exists
    /// so the coordinator can make a last attempt on shutdown.
    async fn flush(&self) -> Result<(), crate::Error>;
}
