//! Registration payload
//!
//! Built fresh from a profile snapshot every time a registration sync
//! starts, so it always reflects the latest committed mutations. It is never
//! stored. Field names follow the remote service's schema verbatim.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{AppConfig, SDK_VERSION};
use crate::device::DeviceInfo;
use crate::event::format_timestamp;
use crate::profile::ProfileSnapshot;

/// One attribute as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Full registration body for `POST /device/v1/registration`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationPayload {
    #[serde(rename = "sdk_Version")]
    pub sdk_version: String,
    #[serde(rename = "dST")]
    pub dst: bool,
    #[serde(rename = "device_Token")]
    pub device_token: String,
    #[serde(rename = "location_Enabled")]
    pub location_enabled: bool,
    #[serde(rename = "etAppId")]
    pub app_id: String,
    #[serde(rename = "platform_Version")]
    pub platform_version: String,
    #[serde(rename = "quietPushEnabled")]
    pub quiet_push_enabled: bool,
    pub tags: Vec<String>,
    pub locale: String,
    #[serde(rename = "proximity_Enabled")]
    pub proximity_enabled: bool,
    #[serde(rename = "registrationDateUtc")]
    pub registration_date_utc: String,
    #[serde(rename = "registrationId")]
    pub registration_id: String,
    pub platform: String,
    /// Whole hours from UTC
    pub timezone: String,
    pub hwid: String,
    pub attributes: Vec<KeyValue>,
    #[serde(rename = "push_Enabled")]
    pub push_enabled: bool,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "app_Version")]
    pub app_version: String,
}

impl RegistrationPayload {
    /// Build a payload from a snapshot taken at `at`
    ///
    /// Location, proximity and quiet push are not supported by this client
    /// and are always reported as disabled.
    pub fn build(
        app: &AppConfig,
        device: &DeviceInfo,
        snapshot: &ProfileSnapshot,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            sdk_version: SDK_VERSION.to_string(),
            dst: device.dst,
            device_token: snapshot.device_token.clone(),
            location_enabled: false,
            app_id: app.app_id.clone(),
            platform_version: device.os_version.clone(),
            quiet_push_enabled: false,
            tags: snapshot.tags.clone(),
            locale: device.locale.clone(),
            proximity_enabled: false,
            registration_date_utc: format_timestamp(at),
            registration_id: snapshot.device_id.clone(),
            platform: device.os.clone(),
            timezone: device.timezone_hours(),
            hwid: device.hardware_type.clone(),
            attributes: snapshot
                .attributes
                .iter()
                .map(|(key, value)| KeyValue {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            push_enabled: snapshot.push_enabled,
            device_id: snapshot.device_id.clone(),
            app_version: device.app_version.clone(),
        }
    }
}
