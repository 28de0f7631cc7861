// # Device Metadata
//
// Static description of the device and host application, supplied by the
// host at construction time. Collecting these values from the OS is the
// host's job; this module only carries and formats them.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Static device and application metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Host application bundle identifier
    pub bundle_id: String,
    /// Host application version
    pub app_version: String,
    /// Operating system name (registration `platform`)
    pub os: String,
    /// Operating system version
    pub os_version: String,
    /// Marketing model name
    pub model: String,
    /// Hardware identifier (registration `hwid`)
    pub hardware_type: String,
    /// Device manufacturer
    pub manufacturer: String,
    /// Locale in `lang_REGION` form, or `unknown`
    pub locale: String,
    /// Offset from UTC in seconds
    pub utc_offset_secs: i32,
    /// Whether daylight-saving time is currently in effect
    pub dst: bool,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            bundle_id: String::new(),
            app_version: String::new(),
            os: std::env::consts::OS.to_string(),
            os_version: String::new(),
            model: String::new(),
            hardware_type: std::env::consts::ARCH.to_string(),
            manufacturer: String::new(),
            locale: "unknown".to_string(),
            utc_offset_secs: chrono::Local::now().offset().local_minus_utc(),
            dst: false,
        }
    }
}

impl DeviceInfo {
    /// Build a locale string from a language and region code
    ///
    /// Returns `unknown` when either part is missing.
    pub fn locale_from_parts(language: &str, region: &str) -> String {
        let language = language.trim();
        let region = region.trim();
        if language.is_empty() || region.is_empty() {
            return "unknown".to_string();
        }
        format!("{}_{}", language, region)
    }

    /// Whole hours from UTC, as sent in the registration `timezone` field
    pub fn timezone_hours(&self) -> String {
        (self.utc_offset_secs / 3600).to_string()
    }

    /// `User-Agent` header value for requests from this device
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} ({} {}; {}; {}/{} {}/{})",
            crate::config::SDK_NAME,
            crate::config::SDK_VERSION,
            self.os,
            self.os_version,
            self.locale,
            self.manufacturer,
            self.hardware_type,
            self.bundle_id,
            self.app_version
        )
    }
}

/// Encode a raw push token as lower-case hex, two digits per byte
pub fn device_token_hex(token: &[u8]) -> String {
    token.iter().fold(String::with_capacity(token.len() * 2), |mut out, byte| {
        let _ = write!(out, "{:02x}", byte);
        out
    })
}
