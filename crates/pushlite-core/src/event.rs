//! The "app closed" tracking event
//!
//! A `CloseEvent` is built once, when the app is backgrounded or terminated,
//! and is never modified afterwards. The same value is persisted as the
//! pending event, sent, and compared on acknowledgment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::push::PushContext;

/// Wire format for every timestamp the device sends: UTC, millisecond precision
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp as `yyyy-MM-ddTHH:mm:ss.SSSZ`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Analytic type codes understood by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticType {
    /// Ordinary app close
    AppClose = 4,
    /// Close of a session that was opened from a push notification
    AppCloseFromPush = 5,
}

impl AnalyticType {
    /// Numeric code sent on the wire
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Map a wire code back to a type
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            4 => Some(Self::AppClose),
            5 => Some(Self::AppCloseFromPush),
            _ => None,
        }
    }
}

/// An "app closed" event awaiting delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEvent {
    /// Seconds the session lasted (since the last launch)
    pub value: u64,

    /// Single-element list holding the analytic type code
    #[serde(rename = "analyticTypes")]
    pub analytic_types: Vec<u32>,

    #[serde(rename = "etAppId")]
    pub app_id: String,

    #[serde(rename = "deviceid")]
    pub device_id: String,

    /// When the close was observed
    #[serde(rename = "eventDate")]
    pub event_date: String,

    /// Push request id, if the session was opened from a push
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Push message id, if the session was opened from a push
    #[serde(rename = "objectIds", default, skip_serializing_if = "Option::is_none")]
    pub object_ids: Option<Vec<String>>,
}

impl CloseEvent {
    /// Build a close event from the current session state
    ///
    /// The analytic type is fixed here: push-originated if the push context
    /// says the app was opened from a notification.
    pub fn new(
        app_id: &str,
        device_id: &str,
        seconds_since_last_launch: u64,
        push: &PushContext,
        at: DateTime<Utc>,
    ) -> Self {
        let analytic_type = if push.opened_from_push {
            AnalyticType::AppCloseFromPush
        } else {
            AnalyticType::AppClose
        };

        Self {
            value: seconds_since_last_launch,
            analytic_types: vec![analytic_type.code()],
            app_id: app_id.to_string(),
            device_id: device_id.to_string(),
            event_date: format_timestamp(at),
            request_id: push.request_id.clone(),
            object_ids: push.object_id.clone().map(|id| vec![id]),
        }
    }

    /// The analytic type this event was built with
    pub fn analytic_type(&self) -> Option<AnalyticType> {
        self.analytic_types
            .first()
            .copied()
            .and_then(AnalyticType::from_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 17, 9, 5, 7).unwrap()
            + chrono::Duration::milliseconds(42)
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        assert_eq!(format_timestamp(at()), "2024-03-17T09:05:07.042Z");
    }

    #[test]
    fn plain_close_omits_push_fields() {
        let event = CloseEvent::new("app", "DEV", 42, &PushContext::default(), at());
        assert_eq!(event.analytic_type(), Some(AnalyticType::AppClose));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "value": 42,
                "analyticTypes": [4],
                "etAppId": "app",
                "deviceid": "DEV",
                "eventDate": "2024-03-17T09:05:07.042Z"
            })
        );
    }

    #[test]
    fn push_close_carries_request_and_object_ids() {
        let push = PushContext {
            opened_from_push: true,
            request_id: Some("req-1".to_string()),
            object_id: Some("msg-9".to_string()),
        };
        let event = CloseEvent::new("app", "DEV", 3, &push, at());
        assert_eq!(event.analytic_type(), Some(AnalyticType::AppCloseFromPush));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["analyticTypes"], serde_json::json!([5]));
        assert_eq!(json["requestId"], "req-1");
        assert_eq!(json["objectIds"], serde_json::json!(["msg-9"]));
    }

    #[test]
    fn persisted_form_reads_back() {
        let event = CloseEvent::new("app", "DEV", 7, &PushContext::default(), at());
        let stored = serde_json::to_string(&event).unwrap();
        let restored: CloseEvent = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, event);
    }
}
