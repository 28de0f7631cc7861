// # PushLite HTTP Sync Client
//
// This crate provides the reqwest-based `SyncClient` for the PushLite device
// API.
//
// - ✅ One HTTP request per call
// - ✅ 2xx is success; any other status is `Error::Status`
// - ✅ Transport failures (connect, TLS, timeout) are `Error::Http`
// - ✅ HTTP timeout configured (30 seconds)
// - ❌ NO retry logic (owned by the batcher and the delivery queue)
// - ❌ NO persistence (owned by the coordinator)
// - ❌ NO background tasks (the coordinator spawns and awaits each call)
//
// ## Security Requirements
//
// - Access token NEVER appears in logs or `Debug` output
// - Client construction fails fast if the token is empty
//
// ## API Reference
//
// - Launch ping: POST `/device/v1/{appId}/sync/{deviceId}` with `{}`
// - Close event: POST `/device/v1/event/analytic` with `[event]`
// - Registration: POST `/device/v1/registration` with the full payload

use async_trait::async_trait;
use pushlite_core::config::{AppConfig, SDK_VERSION};
use pushlite_core::traits::SyncClient;
use pushlite_core::{CloseEvent, DeviceInfo, Error, RegistrationPayload, Result};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the SDK version on every call
const SDK_VERSION_HEADER: &str = "X-SDK-Version";

/// HTTP implementation of [`SyncClient`]
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. All coordination (debounce, replay, grace
/// periods) is owned by `LifecycleCoordinator`.
pub struct HttpSyncClient {
    app: AppConfig,

    /// Precomputed from the static device metadata
    user_agent: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the access token
impl std::fmt::Debug for HttpSyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSyncClient")
            .field("app_id", &self.app.app_id)
            .field("access_token", &"<REDACTED>")
            .field("endpoint", &self.app.endpoint())
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl HttpSyncClient {
    /// Create a client with the default 30 second timeout
    pub fn new(app: AppConfig, device: &DeviceInfo) -> Result<Self> {
        Self::with_timeout(app, device, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    ///
    /// # Errors
    ///
    /// `Error::Config` if the application settings are invalid, `Error::Http`
    /// if the underlying HTTP client cannot be built.
    pub fn with_timeout(app: AppConfig, device: &DeviceInfo, timeout: Duration) -> Result<Self> {
        app.validate()?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            app,
            user_agent: device.user_agent(),
            client,
        })
    }

    /// POST `body` as JSON to `path` and map the status
    async fn post<B>(&self, call: &'static str, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}{}", self.app.endpoint(), path);
        tracing::debug!("{}: POST {}", call, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.app.access_token)
            .header(CONTENT_TYPE, "application/json")
            .header(SDK_VERSION_HEADER, SDK_VERSION)
            .header(USER_AGENT, &self.user_agent)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", call, e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("{}: {}", call, status);
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        tracing::warn!("{} rejected: {} - {}", call, status, error_text);
        Err(Error::status(call, status.as_u16()))
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn app_launch(&self, device_id: &str) -> Result<()> {
        let path = format!("/device/v1/{}/sync/{}", self.app.app_id, device_id);
        self.post("app_launch", &path, &serde_json::json!({})).await
    }

    async fn track_close(&self, event: &CloseEvent) -> Result<()> {
        self.post(
            "track_close",
            "/device/v1/event/analytic",
            std::slice::from_ref(event),
        )
        .await
    }

    async fn register(&self, payload: &RegistrationPayload) -> Result<()> {
        self.post("register", "/device/v1/registration", payload)
            .await
    }

    fn client_name(&self) -> &'static str {
        "http"
    }
}
