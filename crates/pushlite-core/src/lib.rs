// # pushlite-core
//
// Core library for the PushLite device client.
//
// ## Architecture Overview
//
// This library keeps a device's push registration and app-usage tracking in
// sync with a remote service:
// - **KeyValueStore**: Trait for the durable storage the profile lives in
// - **SyncClient**: Trait for the three remote calls (launch, close, register)
// - **BackgroundExecution**: Trait for the host's grace-period token
// - **DeviceProfileStore**: Typed, namespaced view of the persisted profile
// - **MutationBatcher**: Debounces profile changes into one registration
// - **DeliveryQueue**: Single-slot, at-least-once delivery of close events
// - **LifecycleCoordinator**: Actor that ties the above to lifecycle signals
//
// ## Design Principles
//
// 1. **Single Owner**: All profile state is mutated on one task
// 2. **Durability First**: A close event is persisted before it is sent
// 3. **Best Effort**: Storage and network failures are logged, never fatal
// 4. **Library-First**: Transport lives in `pushlite-http`, hosts plug in

pub mod batcher;
pub mod config;
pub mod delivery;
pub mod device;
pub mod engine;
pub mod error;
pub mod event;
pub mod profile;
pub mod push;
pub mod registration;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{AppConfig, EngineConfig, PushLiteConfig, SDK_NAME, SDK_VERSION, StateStoreConfig};
pub use device::{DeviceInfo, device_token_hex};
pub use engine::{LifecycleCoordinator, LifecycleSignal, PushLite, SyncEvent};
pub use error::{Error, Result};
pub use event::{AnalyticType, CloseEvent};
pub use profile::{DeviceProfileStore, ProfileSnapshot};
pub use push::{PushContext, PushMetadata};
pub use registration::{KeyValue, RegistrationPayload};
pub use state::{FileKeyValueStore, MemoryKeyValueStore, create_state_store};
pub use traits::{BackgroundExecution, BackgroundTaskId, KeyValueStore, NoopBackgroundExecution, SyncClient};
