//! HTTP API Integration Tests
//!
//! Router-level tests using tower's `oneshot`; no socket is bound.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use civmap_ingest::db::{self, BaseRecordStore};
use civmap_ingest::services::AddressCache;
use civmap_ingest::AppState;
use helpers::{resolver_with, TableProvider, BEILUN, NOWHERE};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BEILUN_KEY: &str = "新竹縣_竹北市_北崙里";

struct TestApp {
    _temp_dir: TempDir,
    router: Router,
    state: AppState,
}

async fn setup(entries: &[(&str, civmap_common::GeoPoint)]) -> TestApp {
    let temp_dir = TempDir::new().unwrap();

    let store = BaseRecordStore::new(temp_dir.path().join("local_db"));
    let key = BEILUN_KEY.parse().unwrap();
    let path = store.path_for(&key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"chief": "陳里長", "population": 4210, "careActions": [{"id": "c0", "title": "既有據點"}]}"#,
    )
    .unwrap();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_tables(&pool).await.unwrap();

    let provider = Arc::new(TableProvider::new(entries));
    let resolver = resolver_with(provider, AddressCache::in_memory());
    let state = AppState::new(pool, store, resolver);
    let router = civmap_ingest::build_router(state.clone());

    TestApp {
        _temp_dir: temp_dir,
        router,
        state,
    }
}

/// Percent-encode non-ASCII bytes of a path
fn encode_path(path: &str) -> String {
    path.bytes()
        .map(|b| {
            if b.is_ascii() {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}

async fn send(app: &TestApp, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(encode_path(path));
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = setup(&[]).await;
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "civmap-ingest");
    assert_eq!(body["villages"], 4);
    assert_eq!(body["townships"], 3);
    assert_eq!(body["cached_addresses"], 0);
    assert_eq!(body["edited_villages"], 0);
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_health_counts_edits_and_cached_addresses() {
    let app = setup(&[("新竹縣竹北市文興路100號", BEILUN)]).await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/villages/{}", BEILUN_KEY),
        Some(json!({"chief": "林里長"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "POST",
        "/api/resolve",
        Some(json!({"address": "新竹縣竹北市文興路100號"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["edited_villages"], 1);
    assert_eq!(body["cached_addresses"], 1);
}

#[tokio::test]
async fn test_get_village_merges_base_record() {
    let app = setup(&[]).await;
    let (status, body) = send(&app, "GET", &format!("/api/villages/{}", BEILUN_KEY), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chief"], "陳里長");
    // Numeric population is stored as text
    assert_eq!(body["population"], "4210");
    assert_eq!(body["careActions"][0]["id"], "c0");
}

#[tokio::test]
async fn test_get_canonical_village_without_data() {
    let app = setup(&[]).await;
    let (status, body) = send(&app, "GET", "/api/villages/新竹縣_橫山鄉_橫山村", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["careActions"], json!([]));
    assert!(body.get("chief").is_none());
}

#[tokio::test]
async fn test_get_village_errors() {
    let app = setup(&[]).await;

    let (status, body) = send(&app, "GET", "/api/villages/not-a-key", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = send(&app, "GET", "/api/villages/臺北市_中正區_建國里", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_patch_then_get_returns_merged_record() {
    let app = setup(&[]).await;
    let path = format!("/api/villages/{}", BEILUN_KEY);

    let edit = json!({
        "chief": "林里長",
        "careActions": [
            {"id": "c0", "title": "既有據點", "status": "paused"},
            {"id": "c1", "title": "新據點"}
        ],
        "wiki": {"history": "清代墾拓"}
    });
    let (status, body) = send(&app, "PATCH", &path, Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chief"], "林里長");

    // Second edit touches one field; the first survives
    let (status, _) = send(&app, "PATCH", &path, Some(json!({"tags": ["農村"]}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chief"], "林里長");
    assert_eq!(body["population"], "4210");
    assert_eq!(body["tags"], json!(["農村"]));
    assert_eq!(body["wiki"]["history"], "清代墾拓");

    let actions = body["careActions"].as_array().unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0]["id"], "c0");
    assert_eq!(actions[0]["status"], "paused");
    assert_eq!(actions[1]["title"], "新據點");

    // Base tier is untouched
    let key = BEILUN_KEY.parse().unwrap();
    let base = app.state.store.load(&key).unwrap().unwrap();
    assert_eq!(base.chief, "陳里長");
    assert_eq!(base.care_actions.len(), 1);
}

#[tokio::test]
async fn test_delete_reverts_to_base_record() {
    let app = setup(&[]).await;
    let path = format!("/api/villages/{}", BEILUN_KEY);

    let (status, _) = send(&app, "PATCH", &path, Some(json!({"chief": "林里長"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "DELETE", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chief"], "陳里長");
    assert_eq!(body["careActions"][0]["id"], "c0");

    let (_, body) = send(&app, "GET", &path, None).await;
    assert_eq!(body["chief"], "陳里長");

    // Nothing left to revert
    let (status, body) = send(&app, "DELETE", &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_patch_rejects_bad_input() {
    let app = setup(&[]).await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/villages/{}", BEILUN_KEY),
        Some(json!(["not", "an", "object"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PATCH",
        "/api/villages/臺北市_中正區_建國里",
        Some(json!({"chief": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resolve_address() {
    let app = setup(&[
        ("新竹縣竹北市文興路100號", BEILUN),
        ("新竹縣寶山鄉雙園路二段", NOWHERE),
    ])
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/resolve",
        Some(json!({"address": "新竹縣竹北市文興路100號4樓"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["villageKey"], BEILUN_KEY);
    assert_eq!(body["point"]["lat"], 24.83);

    let (status, body) = send(
        &app,
        "POST",
        "/api/resolve",
        Some(json!({"address": "新竹縣寶山鄉雙園路二段"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "UNRESOLVED");

    let (status, _) = send(&app, "POST", "/api/resolve", Some(json!({"address": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_townships() {
    let app = setup(&[]).await;
    let (status, body) = send(&app, "GET", "/api/townships", None).await;

    assert_eq!(status, StatusCode::OK);
    let keys: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["新竹市_東區", "新竹縣_橫山鄉", "新竹縣_竹北市"]);
    assert_eq!(body[2]["villageCount"], 2);
    assert!(body[2]["label"].is_object());
}
