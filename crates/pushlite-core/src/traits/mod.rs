//! Core traits for the PushLite client
//!
//! This module defines the boundaries to the host and the outside world.
//!
//! - [`KeyValueStore`]: Durable storage for the device profile
//! - [`SyncClient`]: The three remote calls
//! - [`BackgroundExecution`]: The host's grace-period token

pub mod background;
pub mod kv_store;
pub mod sync_client;

pub use background::{BackgroundExecution, BackgroundTaskId, NoopBackgroundExecution};
pub use kv_store::KeyValueStore;
pub use sync_client::SyncClient;
