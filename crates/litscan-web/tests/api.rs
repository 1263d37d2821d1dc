//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use litscan_config::Config;
use litscan_llm::{EnrichmentClient, RetryPolicy};
use litscan_tasks::{Orchestrator, OrchestratorSettings};
use litscan_test_utils::{article_set, ScriptedBackend, StaticSource};
use litscan_web::{router::build_router, state::AppState};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    _output: TempDir,
    _static: TempDir,
}

fn setup(backend: ScriptedBackend) -> TestApp {
    let output = TempDir::new().unwrap();
    let assets = TempDir::new().unwrap();
    std::fs::write(assets.path().join("index.html"), "<h1>litscan</h1>").unwrap();

    let mut config = Config::default();
    config.output.dir = output.path().display().to_string();
    config.server.static_dir = assets.path().display().to_string();

    let enrichment = EnrichmentClient::new(backend.into_arc(), RetryPolicy::immediate(1));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(StaticSource::new(article_set(3))),
        enrichment,
        OrchestratorSettings::from_config(&config),
    ));
    TestApp {
        router: build_router(AppState::new(orchestrator, &config)),
        _output: output,
        _static: assets,
    }
}

async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn wait_for_status(app: &TestApp, id: &str, wanted: &str) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let (_, view) = send_json(app, Method::GET, &format!("/api/task/{}", id), None).await;
            if view["status"] == wanted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task never reached the expected status");
}

#[tokio::test]
async fn test_config_lists_default_venues() {
    let app = setup(ScriptedBackend::echo());
    let (status, json) = send_json(&app, Method::GET, "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    let publishers: Vec<_> = json["journals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["publisher"].as_str().unwrap())
        .collect();
    assert_eq!(publishers, vec!["Nature", "Cell", "Science"]);
    assert_eq!(json["defaults"]["max_results"], 30);
    assert_eq!(json["defaults"]["start_date"], "2025/01/01");
}

#[tokio::test]
async fn test_journals_update_replaces_table() {
    let app = setup(ScriptedBackend::echo());
    let update = json!({ "journals": [{ "publisher": "Lancet", "journals": ["Lancet"] }] });
    let (status, _) = send_json(&app, Method::POST, "/api/journals", Some(update)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send_json(&app, Method::GET, "/api/config", None).await;
    assert_eq!(json["journals"].as_array().unwrap().len(), 1);
    assert_eq!(json["journals"][0]["publisher"], "Lancet");

    let empty = json!({ "journals": [] });
    let (status, json) = send_json(&app, Method::POST, "/api/journals", Some(empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_search_to_download() {
    let app = setup(ScriptedBackend::echo());
    let (status, created) = send_json(
        &app,
        Method::POST,
        "/api/search",
        Some(json!({ "topic": "esophageal cancer", "max_workers": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "pending");
    let id = created["task_id"].as_str().unwrap().to_string();

    wait_for_status(&app, &id, "completed").await;
    let (status, view) = send_json(&app, Method::GET, &format!("/api/task/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["progress"], 100);
    assert_eq!(view["result_count"], 3);

    let (status, results) = send_json(&app, Method::GET, &format!("/api/task/{}/results", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["results"].as_array().unwrap().len(), 3);
    assert_eq!(results["results"][0]["summary"], "summary of 1001");
    assert_eq!(results["polished_topic"], "Polished topic");
    assert_eq!(results["review_content"], "generated review");

    let table = results["files"]["table"].as_str().unwrap();
    let (status, bytes) = send(&app, Method::GET, &format!("/api/files/{}", table), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().starts_with("#,PMID,Title"));

    let (_, list) = send_json(&app, Method::GET, "/api/tasks", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send_json(&app, Method::DELETE, &format!("/api/task/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, Method::GET, &format!("/api/task/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_control_conflicts_on_running_task() {
    let app = setup(ScriptedBackend::echo().with_delay(Duration::from_millis(200)));
    let (_, created) = send_json(&app, Method::POST, "/api/search", Some(json!({ "topic": "t", "max_workers": 1 }))).await;
    let id = created["task_id"].as_str().unwrap().to_string();
    wait_for_status(&app, &id, "running").await;

    let (status, json) = send_json(&app, Method::GET, &format!("/api/task/{}/results", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("running"));

    let (status, _) = send_json(&app, Method::POST, &format!("/api/task/{}/resume", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send_json(&app, Method::DELETE, &format!("/api/task/{}", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, view) = send_json(&app, Method::POST, &format!("/api/task/{}/pause", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "paused");

    let (status, view) = send_json(&app, Method::POST, &format!("/api/task/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "cancelled");
    assert_eq!(view["message"], "Cancelled by user");

    let (status, _) = send_json(&app, Method::POST, &format!("/api/task/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_bad_requests() {
    let app = setup(ScriptedBackend::echo());

    let (status, json) = send_json(&app, Method::POST, "/api/search", Some(json!({ "topic": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("topic"));

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/api/search",
        Some(json!({ "topic": "t", "start_date": "2025/09/01", "end_date": "2025/01/01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = uuid::Uuid::new_v4();
    let (status, json) = send_json(&app, Method::GET, &format!("/api/task/{}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/task/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_file_download_stays_in_output_dir() {
    let app = setup(ScriptedBackend::echo());
    let (status, _) = send(&app, Method::GET, "/api/files/..%2F..%2Fetc%2Fpasswd", None).await;
    assert_ne!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/files/missing.csv", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_events_stream_ends_for_finished_task() {
    let app = setup(ScriptedBackend::echo());
    let (_, created) = send_json(&app, Method::POST, "/api/search", Some(json!({ "topic": "t" }))).await;
    let id = created["task_id"].as_str().unwrap().to_string();
    wait_for_status(&app, &id, "completed").await;

    let (status, bytes) = send(&app, Method::GET, &format!("/api/task/{}/events", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let body = String::from_utf8(bytes).unwrap();
    assert!(body.contains(r#""type":"finished""#), "{}", body);
    assert!(body.contains(r#""status":"completed""#), "{}", body);
}

#[tokio::test]
async fn test_index_is_served() {
    let app = setup(ScriptedBackend::echo());
    let (status, bytes) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"<h1>litscan</h1>");
}
