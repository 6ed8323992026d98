//! Integration tests for the kq-api HTTP surface
//!
//! Drives the full router with `oneshot` against a temp-file database:
//! - Health and build info
//! - Event scheduling and lifecycle
//! - Queue requests, ordering and the stage
//! - Attendance and its effect on who is called up
//! - Song catalog moderation and settings
//! - The SSE stream

use axum::body::Body;
use axum::http::{header, StatusCode};
use futures::StreamExt;
use http::{Method, Request};
use kq_api::{build_router, AppState};
use kq_common::db::init_database;
use kq_common::events::EventBus;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: axum::Router,
    _dir: TempDir,
}

async fn setup_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let db = init_database(&dir.path().join("karaoke.db")).await.unwrap();
    let state = AppState::new(db, EventBus::new(100), Duration::from_secs(15));
    TestApp {
        router: build_router(state),
        _dir: dir,
    }
}

/// Helper function to make HTTP requests to the test app
async fn make_request(
    app: &TestApp,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let mut request = Request::builder().method(method).uri(path);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = match body {
        Some(json_body) => request.body(Body::from(json_body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json_body = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };
    (status, json_body)
}

async fn create_event(app: &TestApp, code: &str, request_limit: Option<i64>) -> String {
    let mut body = json!({
        "code": code,
        "description": "Thursday karaoke",
        "location": "Main bar",
        "scheduled_date": "2026-10-22",
        "scheduled_start_time": "20:00:00",
    });
    if let Some(limit) = request_limit {
        body["request_limit"] = json!(limit);
    }
    let (status, body) = make_request(app, Method::POST, "/api/events", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    body.unwrap()["id"].as_str().unwrap().to_string()
}

async fn create_active_song(app: &TestApp, title: &str) -> String {
    let (status, body) = make_request(
        app,
        Method::POST,
        "/api/songs",
        Some(json!({
            "title": title,
            "artist": "Test Artist",
            "energy": 0.5,
            "auto_approve": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body.unwrap()["id"].as_str().unwrap().to_string()
}

async fn request_song(app: &TestApp, event_id: &str, song_id: &str, requestor: &str) -> (StatusCode, Value) {
    let (status, body) = make_request(
        app,
        Method::POST,
        &format!("/api/events/{}/queue", event_id),
        Some(json!({ "song_id": song_id, "requestor": requestor })),
    )
    .await;
    (status, body.unwrap_or(Value::Null))
}

async fn queue_requestors(app: &TestApp, event_id: &str) -> Vec<String> {
    let (status, body) = make_request(app, Method::GET, &format!("/api/events/{}/queue", event_id), None).await;
    assert_eq!(status, StatusCode::OK);
    body.unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["requestor"].as_str().unwrap().to_string())
        .collect()
}

async fn post(app: &TestApp, path: &str) -> (StatusCode, Value) {
    let (status, body) = make_request(app, Method::POST, path, None).await;
    (status, body.unwrap_or(Value::Null))
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;
    let (status, body) = make_request(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "kq-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_build_info() {
    let app = setup_app().await;
    let (status, body) = make_request(&app, Method::GET, "/build_info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.unwrap()["git_hash"].is_string());
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_event_crud() {
    let app = setup_app().await;
    let id = create_event(&app, "THU-1", None).await;

    let (status, body) = make_request(&app, Method::GET, &format!("/api/events/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["code"], "THU-1");
    assert_eq!(body["status"], "Upcoming");
    assert_eq!(body["request_limit"], 5);

    let (status, body) = make_request(&app, Method::GET, "/api/events/code/THU-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["id"], id.as_str());

    let (status, body) = make_request(
        &app,
        Method::PATCH,
        &format!("/api/events/{}", id),
        Some(json!({ "dj_name": "DJ Lux", "visibility": "Hidden" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["dj_name"], "DJ Lux");

    // Hidden events are left out of the default listing
    let (_, body) = make_request(&app, Method::GET, "/api/events", None).await;
    assert!(body.unwrap().as_array().unwrap().is_empty());
    let (_, body) = make_request(&app, Method::GET, "/api/events?include_hidden=true", None).await;
    assert_eq!(body.unwrap().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_event_errors() {
    let app = setup_app().await;
    create_event(&app, "DUP", None).await;

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/api/events",
        Some(json!({ "code": "DUP", "scheduled_date": "2026-10-23" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.unwrap()["status"], "error");

    let missing = format!("/api/events/{}", uuid::Uuid::new_v4());
    let (status, _) = make_request(&app, Method::GET, &missing, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/api/events",
        Some(json!({ "code": "ZERO", "scheduled_date": "2026-10-23", "request_limit": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Send a raw body so malformed JSON reaches the router untouched
async fn send_raw(app: &TestApp, method: Method, path: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_malformed_input_gets_json_error() {
    let app = setup_app().await;

    let (status, body) = make_request(&app, Method::GET, "/api/events/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = body.expect("error body should be JSON");
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("UUID"));

    let (status, body) = send_raw(&app, Method::POST, "/api/events", r#"{"code":"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let id = create_event(&app, "BADQ", None).await;
    let (status, body) = send_raw(
        &app,
        Method::PUT,
        &format!("/api/events/{}/queue/order", id),
        r#"{"order": ["nope"]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = make_request(&app, Method::GET, "/api/songs?limit=lots", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["status"], "error");
}

#[tokio::test]
async fn test_event_status_transitions() {
    let app = setup_app().await;
    let id = create_event(&app, "FLOW", None).await;
    let path = format!("/api/events/{}/status", id);

    let (status, body) = make_request(&app, Method::POST, &path, Some(json!({ "status": "Live" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "Live");

    let (status, _) = make_request(&app, Method::POST, &path, Some(json!({ "status": "Upcoming" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = make_request(&app, Method::POST, &path, Some(json!({ "status": "Archived" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "Archived");
}

// =============================================================================
// Queue
// =============================================================================

#[tokio::test]
async fn test_queue_flow() {
    let app = setup_app().await;
    let event_id = create_event(&app, "Q", None).await;
    let song_id = create_active_song(&app, "Sweet Caroline").await;

    for singer in ["ann", "bo", "cy"] {
        let (status, entry) = request_song(&app, &event_id, &song_id, singer).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(entry["singers"], json!([singer]));
    }
    assert_eq!(queue_requestors(&app, &event_id).await, vec!["ann", "bo", "cy"]);

    // Only bo and cy are here
    for singer in ["bo", "cy"] {
        let (status, _) = post(&app, &format!("/api/events/{}/attendance/{}/check-in", event_id, singer)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = post(&app, &format!("/api/events/{}/queue/next", event_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"]["requestor"], "bo");

    let (_, body) = make_request(&app, Method::GET, &format!("/api/events/{}/queue/current", event_id), None).await;
    assert_eq!(body.unwrap()["current"]["requestor"], "bo");

    let (status, body) = post(&app, &format!("/api/events/{}/queue/next", event_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"]["requestor"], "cy");

    // Ann still waits at the front
    assert_eq!(queue_requestors(&app, &event_id).await, vec!["ann", "cy"]);

    let (status, body) = post(&app, &format!("/api/events/{}/queue/complete", event_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Archived");

    let (_, body) = make_request(&app, Method::GET, &format!("/api/events/{}/queue/history", event_id), None).await;
    let history: Vec<String> = body
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["requestor"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(history.len(), 2);
    assert!(history.contains(&"bo".to_string()));

    let (_, body) = make_request(&app, Method::GET, &format!("/api/events/{}", event_id), None).await;
    assert_eq!(body.unwrap()["queue_count"], 1);
}

#[tokio::test]
async fn test_reorder_move_remove() {
    let app = setup_app().await;
    let event_id = create_event(&app, "ORDER", None).await;
    let song_id = create_active_song(&app, "Mr. Brightside").await;

    let mut ids = Vec::new();
    for singer in ["a", "b", "c"] {
        let (_, entry) = request_song(&app, &event_id, &song_id, singer).await;
        ids.push(entry["id"].as_str().unwrap().to_string());
    }

    let (status, _) = make_request(
        &app,
        Method::PUT,
        &format!("/api/events/{}/queue/order", event_id),
        Some(json!({ "order": [ids[2], ids[0], ids[1]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue_requestors(&app, &event_id).await, vec!["c", "a", "b"]);

    // Stale view: one entry missing
    let (status, body) = make_request(
        &app,
        Method::PUT,
        &format!("/api/events/{}/queue/order", event_id),
        Some(json!({ "order": [ids[0], ids[1]] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.unwrap()["status"], "error");

    let (status, _) = make_request(
        &app,
        Method::POST,
        &format!("/api/events/{}/queue/{}/move", event_id, ids[1]),
        Some(json!({ "position": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue_requestors(&app, &event_id).await, vec!["b", "c", "a"]);

    let (status, _) = make_request(
        &app,
        Method::POST,
        &format!("/api/events/{}/queue/{}/move", event_id, ids[1]),
        Some(json!({ "position": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = make_request(
        &app,
        Method::DELETE,
        &format!("/api/events/{}/queue/{}", event_id, ids[2]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_none());
    assert_eq!(queue_requestors(&app, &event_id).await, vec!["b", "a"]);

    let (_, body) = make_request(&app, Method::GET, &format!("/api/events/{}/queue", event_id), None).await;
    let positions: Vec<i64> = body
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["position"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 2]);
}

#[tokio::test]
async fn test_skip_and_play_override() {
    let app = setup_app().await;
    let event_id = create_event(&app, "DJ", None).await;
    let song_id = create_active_song(&app, "Valerie").await;

    let (_, first) = request_song(&app, &event_id, &song_id, "first").await;
    let (_, second) = request_song(&app, &event_id, &song_id, "second").await;

    let (status, body) = post(
        &app,
        &format!("/api/events/{}/queue/{}/play", event_id, second["id"].as_str().unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_current"], true);
    assert_eq!(body["status"], "Live");

    let (status, body) = post(
        &app,
        &format!("/api/events/{}/queue/{}/skip", event_id, first["id"].as_str().unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["was_skipped"], true);
    assert_eq!(queue_requestors(&app, &event_id).await, vec!["second"]);
}

#[tokio::test]
async fn test_request_limit_and_song_state() {
    let app = setup_app().await;
    let event_id = create_event(&app, "LIMIT", Some(1)).await;
    let song_id = create_active_song(&app, "Hey Jude").await;

    let (status, _) = request_song(&app, &event_id, &song_id, "greedy").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = request_song(&app, &event_id, &song_id, "greedy").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    // Pending songs cannot be queued until approved
    let (_, pending) = make_request(
        &app,
        Method::POST,
        "/api/songs",
        Some(json!({ "title": "New Tune", "artist": "Someone", "requested_by": "fan" })),
    )
    .await;
    let pending_id = pending.unwrap()["id"].as_str().unwrap().to_string();
    let (status, _) = request_song(&app, &event_id, &pending_id, "fan").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = make_request(
        &app,
        Method::POST,
        &format!("/api/songs/{}/moderate", pending_id),
        Some(json!({ "status": "Active", "moderator": "DJ Lux" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["approved_by"], "DJ Lux");

    let (status, _) = request_song(&app, &event_id, &pending_id, "fan").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_canceled_event_is_closed() {
    let app = setup_app().await;
    let event_id = create_event(&app, "CANCEL", None).await;
    let song_id = create_active_song(&app, "Dancing Queen").await;
    request_song(&app, &event_id, &song_id, "early").await;
    post(&app, &format!("/api/events/{}/attendance/early/check-in", event_id)).await;

    let (status, body) = post(&app, &format!("/api/events/{}/cancel", event_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_canceled"], true);
    assert_eq!(body["queue_count"], 0);

    let (status, _) = request_song(&app, &event_id, &song_id, "late").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = make_request(
        &app,
        Method::GET,
        &format!("/api/events/{}/attendance/early", event_id),
        None,
    )
    .await;
    assert_eq!(body.unwrap()["is_checked_in"], false);

    // Idempotent
    let (status, _) = post(&app, &format!("/api/events/{}/cancel", event_id)).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Attendance
// =============================================================================

#[tokio::test]
async fn test_attendance_break_cycle() {
    let app = setup_app().await;
    let event_id = create_event(&app, "BREAK", None).await;
    let base = format!("/api/events/{}/attendance/5551212", event_id);

    let (status, body) = post(&app, &format!("{}/break/start", base)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    let (status, body) = post(&app, &format!("{}/check-in", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_checked_in"], true);

    let (status, body) = post(&app, &format!("{}/break/start", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_on_break"], true);
    assert!(body["break_start_at"].is_string());

    let (status, body) = post(&app, &format!("{}/break/end", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_on_break"], false);
    assert!(body["break_end_at"].is_string());

    let (status, _) = post(&app, &format!("{}/check-out", base)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = make_request(
        &app,
        Method::GET,
        &format!("/api/events/{}/attendance/history?singer=5551212", event_id),
        None,
    )
    .await;
    let actions: Vec<String> = body
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, vec!["CheckIn", "BreakStart", "BreakEnd", "CheckOut"]);

    let (_, body) = make_request(&app, Method::GET, &format!("/api/events/{}/attendance", event_id), None).await;
    assert_eq!(body.unwrap().as_array().unwrap().len(), 1);
}

// =============================================================================
// Songs and settings
// =============================================================================

#[tokio::test]
async fn test_song_search() {
    let app = setup_app().await;
    create_active_song(&app, "Purple Rain").await;
    create_active_song(&app, "Purple Haze").await;
    create_active_song(&app, "Yellow").await;

    let (status, body) = make_request(&app, Method::GET, "/api/songs?q=purple&limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().as_array().unwrap().len(), 1);

    let (_, body) = make_request(&app, Method::GET, "/api/songs?q=PURPLE", None).await;
    assert_eq!(body.unwrap().as_array().unwrap().len(), 2);

    let (_, body) = make_request(&app, Method::GET, "/api/songs?status=Pending", None).await;
    assert!(body.unwrap().as_array().unwrap().is_empty());

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/api/songs",
        Some(json!({ "title": "Bad", "artist": "Data", "popularity": 300 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_endpoints() {
    let app = setup_app().await;

    let (status, body) = make_request(&app, Method::GET, "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().as_array().unwrap().len(), 4);

    let (status, body) = make_request(
        &app,
        Method::PUT,
        "/api/settings/default_request_limit",
        Some(json!({ "value": "2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["value"], "2");

    // New events pick up the changed default
    let id = create_event(&app, "AFTER", None).await;
    let (_, body) = make_request(&app, Method::GET, &format!("/api/events/{}", id), None).await;
    assert_eq!(body.unwrap()["request_limit"], 2);

    let (status, _) = make_request(
        &app,
        Method::PUT,
        "/api/settings/unknown_key",
        Some(json!({ "value": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// SSE
// =============================================================================

#[tokio::test]
async fn test_event_stream_delivers_filtered_events() {
    let app = setup_app().await;
    let mine = create_event(&app, "MINE", None).await;
    let other = create_event(&app, "OTHER", None).await;

    let request = Request::builder()
        .uri(format!("/events?event_id={}", mine))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/event-stream"
    );
    let mut stream = response.into_body().into_data_stream();

    let patch = |id: &str| format!("/api/events/{}", id);
    let (status, _) = make_request(&app, Method::PATCH, &patch(&other), Some(json!({ "location": "Patio" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = make_request(&app, Method::PATCH, &patch(&mine), Some(json!({ "location": "Stage" }))).await;
    assert_eq!(status, StatusCode::OK);

    let frame = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("stream should deliver an event")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: EventUpdated"), "frame: {}", text);
    assert!(text.contains(&mine));
    assert!(!text.contains(&other));
}
