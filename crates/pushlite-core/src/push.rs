// # Push Context
//
// Attribution for sessions opened from a push notification. The host reports
// the notification; the next close event consumes the attribution and the
// next launch resets it.

use serde::{Deserialize, Serialize};

/// Key in a notification payload that carries the request id
const REQUEST_ID_KEY: &str = "_r";

/// Key in a notification payload that carries the message (object) id
const OBJECT_ID_KEY: &str = "_m";

/// Metadata extracted from a received push notification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMetadata {
    pub request_id: Option<String>,
    pub object_id: Option<String>,
}

impl PushMetadata {
    pub fn new(request_id: Option<String>, object_id: Option<String>) -> Self {
        Self {
            request_id,
            object_id,
        }
    }

    /// Read the ids from a notification's user-info dictionary
    ///
    /// Non-string values are ignored.
    pub fn from_user_info(user_info: &serde_json::Value) -> Self {
        let field = |key: &str| {
            user_info
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };

        Self {
            request_id: field(REQUEST_ID_KEY),
            object_id: field(OBJECT_ID_KEY),
        }
    }
}

/// Push attribution for the current session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushContext {
    pub opened_from_push: bool,
    pub request_id: Option<String>,
    pub object_id: Option<String>,
}

impl From<PushMetadata> for PushContext {
    fn from(metadata: PushMetadata) -> Self {
        Self {
            opened_from_push: true,
            request_id: metadata.request_id,
            object_id: metadata.object_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_ids_from_user_info() {
        let metadata = PushMetadata::from_user_info(&json!({
            "_r": "request-1",
            "_m": "message-2",
            "aps": { "alert": "hi" }
        }));
        assert_eq!(metadata.request_id.as_deref(), Some("request-1"));
        assert_eq!(metadata.object_id.as_deref(), Some("message-2"));
    }

    #[test]
    fn ignores_missing_or_non_string_ids() {
        let metadata = PushMetadata::from_user_info(&json!({ "_r": 12 }));
        assert_eq!(metadata, PushMetadata::default());
    }

    #[test]
    fn metadata_marks_session_as_opened_from_push() {
        let context = PushContext::from(PushMetadata::new(Some("r".into()), None));
        assert!(context.opened_from_push);
        assert_eq!(context.request_id.as_deref(), Some("r"));
        assert_eq!(context.object_id, None);
    }
}
