mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use interview_qa::server::{router, AppState};

use common::harness;

fn app(tmp: &TempDir) -> (Router, std::path::PathBuf) {
    let h = harness(tmp.path(), 4);
    let feedback_path = h.config.feedback.path.clone();
    (
        router(AppState::new(Arc::new(h.pipeline))),
        feedback_path,
    )
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn upload(name: &str, text: &str) -> Value {
    json!({
        "name": name,
        "content_base64": base64::engine::general_purpose::STANDARD.encode(text),
    })
}

fn resume_upload() -> Value {
    let doc = common::resume();
    upload(&doc.name, std::str::from_utf8(&doc.bytes).unwrap())
}

#[tokio::test]
async fn health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = app(&tmp);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ask_before_ingest_is_conflict() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = app(&tmp);

    let (status, body) = send(&app, "GET", "/index", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "absent");

    let (status, body) = send(&app, "POST", "/ask", Some(json!({ "question": "Why?" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "index_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("No index available"));
}

#[tokio::test]
async fn ingest_ask_and_feedback_round() {
    let tmp = TempDir::new().unwrap();
    let (app, feedback_path) = app(&tmp);

    let (status, report) = send(
        &app,
        "POST",
        "/ingest",
        Some(json!({ "documents": [resume_upload()] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(report["chunks"].as_u64().unwrap() > 0);
    assert_eq!(report["documents"][0]["name"], "resume.txt");

    let (_, index) = send(&app, "GET", "/index", None).await;
    assert_eq!(index["state"], "present");
    assert_eq!(index["chunk_count"], report["chunks"]);

    let (status, answer) = send(
        &app,
        "POST",
        "/ask",
        Some(json!({ "question": "What eviction policy did the distributed cache use?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["answer"], "LRU eviction.");
    assert!(answer["sources"][0]["excerpt"]
        .as_str()
        .unwrap()
        .contains("LRU eviction"));

    // Feedback without an explicit answer attaches to the last one.
    let (status, body) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({ "feedback": "accurate" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "recorded");

    let content = std::fs::read_to_string(&feedback_path).unwrap();
    assert_eq!(content, "Response: LRU eviction. | Feedback: accurate\n");
}

#[tokio::test]
async fn feedback_without_any_answer_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let (app, feedback_path) = app(&tmp);

    let (status, body) = send(&app, "POST", "/feedback", Some(json!({ "feedback": "hm" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(!feedback_path.exists());

    let (status, _) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({ "feedback": "too vague", "answer": "It depends." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        std::fs::read_to_string(&feedback_path).unwrap(),
        "Response: It depends. | Feedback: too vague\n"
    );
}

#[tokio::test]
async fn ingest_errors_map_to_client_statuses() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = app(&tmp);

    let (status, body) = send(
        &app,
        "POST",
        "/ingest",
        Some(json!({ "documents": [upload("blank.txt", "   \n")] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "empty_input");

    let (status, body) = send(
        &app,
        "POST",
        "/ingest",
        Some(json!({ "documents": [{ "name": "a.txt", "content_base64": "%%%" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(
        &app,
        "POST",
        "/ingest",
        Some(json!({ "documents": [upload("photo.jpg", "jpeg")] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("cannot infer content type"));

    let (status, body) = send(
        &app,
        "POST",
        "/ingest",
        Some(json!({ "documents": [{
            "name": "photo.jpg",
            "content_type": "image/jpeg",
            "content_base64": "anBlZw==",
        }] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "extract_failed");
}

#[tokio::test]
async fn blank_question_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = app(&tmp);

    let (status, body) = send(&app, "POST", "/ask", Some(json!({ "question": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "empty_query");
}
