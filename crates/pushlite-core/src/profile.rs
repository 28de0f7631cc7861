//! Device profile store
//!
//! Typed, namespaced accessors over a [`KeyValueStore`]. Each field lives
//! under its own key and is read and written independently; there are no
//! cross-field transactions.
//!
//! Storage is treated as always available. A read that fails, or whose
//! value does not decode, behaves as if the field were absent. A write that
//! fails is logged and dropped. Neither is reported to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::event::CloseEvent;
use crate::push::PushContext;
use crate::traits::KeyValueStore;

/// Persisted profile fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileKey {
    DeviceId,
    DeviceToken,
    PushEnabled,
    Tags,
    Attributes,
    AppLastLaunched,
    PendingCloseEvent,
    PushContext,
}

impl ProfileKey {
    fn suffix(self) -> &'static str {
        match self {
            ProfileKey::DeviceId => "deviceID",
            ProfileKey::DeviceToken => "deviceToken",
            ProfileKey::PushEnabled => "pushEnabled",
            ProfileKey::Tags => "tags",
            ProfileKey::Attributes => "attributes",
            ProfileKey::AppLastLaunched => "appLastLaunched",
            ProfileKey::PendingCloseEvent => "pendingCloseEvent",
            ProfileKey::PushContext => "pushContext",
        }
    }
}

/// Point-in-time copy of the fields that go into a registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub device_id: String,
    pub device_token: String,
    pub push_enabled: bool,
    pub tags: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub last_launched_at: Option<DateTime<Utc>>,
}

/// Durable device profile
#[derive(Clone)]
pub struct DeviceProfileStore {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl DeviceProfileStore {
    /// Create a profile store over `store`, prefixing every key with `namespace`
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Full storage key for a field, e.g. `com.pushlite.deviceID`
    fn key(&self, field: ProfileKey) -> String {
        format!("{}.{}", self.namespace, field.suffix())
    }

    async fn read<T: DeserializeOwned>(&self, field: ProfileKey) -> Option<T> {
        let key = self.key(field);
        match self.store.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!("Discarding undecodable value for {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read {}: {}", key, e);
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, field: ProfileKey, value: &T) {
        let key = self.key(field);
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Failed to encode {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(&key, encoded).await {
            error!("Failed to write {}: {}", key, e);
        }
    }

    async fn clear(&self, field: ProfileKey) {
        let key = self.key(field);
        if let Err(e) = self.store.remove(&key).await {
            error!("Failed to remove {}: {}", key, e);
        }
    }

    /// Device identifier, generated and stored on first access
    ///
    /// Once stored, the same value is returned for the lifetime of the
    /// installation. Generation happens on the coordinator task, so two
    /// first reads cannot race.
    pub async fn device_id(&self) -> String {
        if let Some(id) = self.read::<String>(ProfileKey::DeviceId).await
            && !id.is_empty()
        {
            return id;
        }

        let id = Uuid::new_v4().to_string().to_uppercase();
        debug!("Generated device id {}", id);
        self.write(ProfileKey::DeviceId, &id).await;
        id
    }

    /// Hex-encoded push token, empty if never set
    pub async fn device_token(&self) -> String {
        self.read(ProfileKey::DeviceToken).await.unwrap_or_default()
    }

    pub async fn set_device_token(&self, token: &str) {
        self.write(ProfileKey::DeviceToken, &token).await;
    }

    pub async fn push_enabled(&self) -> bool {
        self.read(ProfileKey::PushEnabled).await.unwrap_or(false)
    }

    pub async fn set_push_enabled(&self, enabled: bool) {
        self.write(ProfileKey::PushEnabled, &enabled).await;
    }

    pub async fn tags(&self) -> Vec<String> {
        self.read(ProfileKey::Tags).await.unwrap_or_default()
    }

    pub async fn set_tags(&self, tags: &[String]) {
        self.write(ProfileKey::Tags, &tags).await;
    }

    pub async fn attributes(&self) -> BTreeMap<String, String> {
        self.read(ProfileKey::Attributes).await.unwrap_or_default()
    }

    pub async fn set_attributes(&self, attributes: &BTreeMap<String, String>) {
        self.write(ProfileKey::Attributes, attributes).await;
    }

    /// When the app was last launched
    ///
    /// Stored as fractional unix seconds; non-positive values read as absent.
    pub async fn last_launched_at(&self) -> Option<DateTime<Utc>> {
        let secs: f64 = self.read(ProfileKey::AppLastLaunched).await?;
        if secs <= 0.0 {
            return None;
        }
        DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
    }

    pub async fn set_last_launched_at(&self, at: Option<DateTime<Utc>>) {
        match at {
            Some(at) => {
                let secs = at.timestamp_millis() as f64 / 1000.0;
                self.write(ProfileKey::AppLastLaunched, &secs).await;
            }
            None => self.clear(ProfileKey::AppLastLaunched).await,
        }
    }

    /// Whole seconds between the last launch and `now`, 0 if never launched
    pub async fn seconds_since_last_launch(&self, now: DateTime<Utc>) -> u64 {
        self.last_launched_at()
            .await
            .map(|launched| now.signed_duration_since(launched).num_seconds().unsigned_abs())
            .unwrap_or(0)
    }

    /// The close event awaiting delivery, if any
    ///
    /// Stored as a JSON string. A value that fails to decode is treated as
    /// no pending event.
    pub async fn pending_close_event(&self) -> Option<CloseEvent> {
        let raw: String = self.read(ProfileKey::PendingCloseEvent).await?;
        match serde_json::from_str(&raw) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Discarding undecodable pending close event: {}", e);
                None
            }
        }
    }

    pub async fn set_pending_close_event(&self, event: Option<&CloseEvent>) {
        let Some(event) = event else {
            self.clear(ProfileKey::PendingCloseEvent).await;
            return;
        };
        match serde_json::to_string(event) {
            Ok(raw) => self.write(ProfileKey::PendingCloseEvent, &raw).await,
            Err(e) => error!("Failed to encode pending close event: {}", e),
        }
    }

    /// Push attribution for the current session
    pub async fn push_context(&self) -> PushContext {
        self.read(ProfileKey::PushContext).await.unwrap_or_default()
    }

    pub async fn set_push_context(&self, context: &PushContext) {
        if *context == PushContext::default() {
            self.clear(ProfileKey::PushContext).await;
        } else {
            self.write(ProfileKey::PushContext, context).await;
        }
    }

    /// Copy of everything a registration needs
    pub async fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            device_id: self.device_id().await,
            device_token: self.device_token().await,
            push_enabled: self.push_enabled().await,
            tags: self.tags().await,
            attributes: self.attributes().await,
            last_launched_at: self.last_launched_at().await,
        }
    }
}
