// # Sync Client Trait
//
// Defines the interface for the three remote calls the device makes.
//
// ## Implementations
//
// - HTTP: `pushlite-http` crate
// - Tests: scripted doubles in `tests/common`

use async_trait::async_trait;

use crate::event::CloseEvent;
use crate::registration::RegistrationPayload;

/// Trait for the remote device API
///
/// # Trust Level: Untrusted
///
/// Sync clients execute a single request per invocation and report the
/// outcome. They know nothing about retries or persistence.
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to the configured endpoint only
/// - ✅ Map the response status to success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by the batcher and delivery queue)
/// - ❌ Touch the device profile (owned by `LifecycleCoordinator`)
/// - ❌ Spawn tasks (the coordinator spawns the call and awaits it)
///
/// ## Outcome mapping
///
/// A 2xx response is `Ok(())`. Any other status, a transport failure or a
/// serialization failure is an `Err`. The coordinator logs the error and
/// only keeps the boolean "delivered" outcome.
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Launch ping: `POST /device/v1/{appId}/sync/{deviceId}` with `{}`
    async fn app_launch(&self, device_id: &str) -> Result<(), crate::Error>;

    /// Close-event delivery: `POST /device/v1/event/analytic` with `[event]`
    async fn track_close(&self, event: &CloseEvent) -> Result<(), crate::Error>;

    /// Registration: `POST /device/v1/registration` with the payload
    async fn register(&self, payload: &RegistrationPayload) -> Result<(), crate::Error>;

    /// Client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
