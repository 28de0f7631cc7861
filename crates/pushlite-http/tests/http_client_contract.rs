//! Behavioral Contract Test: HTTP Sync Client
//!
//! This test runs the client against an in-process fake of the device API.
//!
//! Constraints verified:
//! - Every call carries the bearer token, SDK version, user agent and JSON
//!   content type
//! - Paths and body shapes match the device API
//! - Any 2xx is success; anything else is a status error
//! - An unreachable endpoint is a transport error
//!
//! If this test fails, someone has:
//! - Changed a wire path or body shape
//! - Treated a non-2xx response as success

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use chrono::{TimeZone, Utc};
use pushlite_core::traits::SyncClient;
use pushlite_core::{
    AppConfig, CloseEvent, DeviceInfo, Error, ProfileSnapshot, PushContext, RegistrationPayload,
    SDK_VERSION,
};
use pushlite_http::HttpSyncClient;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: serde_json::Value,
}

/// Records every request and answers with the scripted status
#[derive(Clone)]
struct FakeDeviceApi {
    requests: Arc<Mutex<Vec<Recorded>>>,
    status: Arc<Mutex<u16>>,
}

impl FakeDeviceApi {
    fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(200)),
        }
    }

    fn respond_with(&self, status: u16) {
        *self.status.lock().unwrap() = status;
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Serve on an ephemeral port and return the base URL
    async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(record).with_state(self.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }
}

async fn record(
    State(api): State<FakeDeviceApi>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    api.requests.lock().unwrap().push(Recorded {
        method,
        path: uri.path().to_string(),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let status = *api.status.lock().unwrap();
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        "{}",
    )
}

fn device() -> DeviceInfo {
    DeviceInfo {
        bundle_id: "com.example.app".to_string(),
        app_version: "2.1.0".to_string(),
        os: "iOS".to_string(),
        os_version: "17.2".to_string(),
        model: "iPhone".to_string(),
        hardware_type: "iPhone15,2".to_string(),
        manufacturer: "Apple".to_string(),
        locale: "en_US".to_string(),
        utc_offset_secs: 3600,
        dst: false,
    }
}

fn client(base: &str) -> HttpSyncClient {
    HttpSyncClient::new(AppConfig::new("app-1", "secret-token", base), &device()).unwrap()
}

fn close_event() -> CloseEvent {
    CloseEvent::new(
        "app-1",
        "DEVICE-1",
        42,
        &PushContext::default(),
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    )
}

fn header<'a>(request: &'a Recorded, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn every_call_carries_the_standard_headers() {
    let api = FakeDeviceApi::new();
    let base = api.serve().await;

    client(&base).app_launch("DEVICE-1").await.unwrap();

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    assert_eq!(request.method, Method::POST);
    assert_eq!(header(request, "authorization"), "Bearer secret-token");
    assert_eq!(header(request, "content-type"), "application/json");
    assert_eq!(header(request, "x-sdk-version"), SDK_VERSION);
    assert_eq!(
        header(request, "user-agent"),
        format!(
            "PushLite/{} (iOS 17.2; en_US; Apple/iPhone15,2 com.example.app/2.1.0)",
            SDK_VERSION
        )
    );
}

#[tokio::test]
async fn launch_ping_posts_an_empty_object() {
    let api = FakeDeviceApi::new();
    let base = api.serve().await;

    client(&format!("{}/", base))
        .app_launch("DEVICE-1")
        .await
        .unwrap();

    let request = &api.requests()[0];
    assert_eq!(request.path, "/device/v1/app-1/sync/DEVICE-1");
    assert_eq!(request.body, serde_json::json!({}));
}

#[tokio::test]
async fn close_event_is_posted_as_a_single_element_array() {
    let api = FakeDeviceApi::new();
    let base = api.serve().await;

    client(&base).track_close(&close_event()).await.unwrap();

    let request = &api.requests()[0];
    assert_eq!(request.path, "/device/v1/event/analytic");
    assert_eq!(
        request.body,
        serde_json::json!([{
            "value": 42,
            "analyticTypes": [4],
            "etAppId": "app-1",
            "deviceid": "DEVICE-1",
            "eventDate": "2024-03-01T12:00:00.000Z",
        }])
    );
}

#[tokio::test]
async fn registration_posts_the_full_payload() {
    let api = FakeDeviceApi::new();
    let base = api.serve().await;

    let snapshot = ProfileSnapshot {
        device_id: "DEVICE-1".to_string(),
        device_token: "000fabff".to_string(),
        push_enabled: true,
        tags: vec!["news".to_string()],
        attributes: BTreeMap::from([("tier".to_string(), "gold".to_string())]),
        last_launched_at: None,
    };
    let app = AppConfig::new("app-1", "secret-token", &base);
    let payload = RegistrationPayload::build(&app, &device(), &snapshot, Utc::now());

    client(&base).register(&payload).await.unwrap();

    let request = &api.requests()[0];
    assert_eq!(request.path, "/device/v1/registration");
    assert_eq!(request.body["etAppId"], "app-1");
    assert_eq!(request.body["deviceID"], "DEVICE-1");
    assert_eq!(request.body["registrationId"], "DEVICE-1");
    assert_eq!(request.body["device_Token"], "000fabff");
    assert_eq!(request.body["push_Enabled"], true);
    assert_eq!(request.body["tags"], serde_json::json!(["news"]));
    assert_eq!(
        request.body["attributes"],
        serde_json::json!([{ "key": "tier", "value": "gold" }])
    );
    assert_eq!(request.body["timezone"], "1");
}

#[tokio::test]
async fn any_2xx_is_success() {
    let api = FakeDeviceApi::new();
    let base = api.serve().await;
    let client = client(&base);

    for status in [200, 201, 202, 204] {
        api.respond_with(status);
        assert!(
            client.track_close(&close_event()).await.is_ok(),
            "status {} should succeed",
            status
        );
    }
}

#[tokio::test]
async fn non_2xx_is_a_status_error() {
    let api = FakeDeviceApi::new();
    let base = api.serve().await;
    let client = client(&base);

    api.respond_with(500);
    let err = client.track_close(&close_event()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Status {
            call: "track_close",
            status: 500
        }
    ));

    api.respond_with(401);
    let err = client.app_launch("DEVICE-1").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Status {
            call: "app_launch",
            status: 401
        }
    ));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // Reserve a port, then close it so nothing is listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}", addr))
        .app_launch("DEVICE-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http(_)), "got {:?}", err);
}
