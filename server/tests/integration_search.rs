use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use docsearch_core::persist::{save_all, save_text, IndexRoot};
use docsearch_core::{build, SourceDocument};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use server::{build_app, ServerOptions};
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &Path) {
    let staged = IndexRoot::new(dir).stage().unwrap();
    let docs = vec![
        SourceDocument::new(1, "installation/index.rst", "Installation", "install the viewer package"),
        SourceDocument::new(2, "introduction.rst", "Overview", "installation overview of the viewer"),
    ];
    for doc in &docs {
        save_text(staged.paths(), doc.id, &doc.raw_text).unwrap();
    }
    save_all(staged.paths(), &build(&docs).unwrap()).unwrap();
    staged.commit().unwrap();
}

fn app(dir: &Path, max_k: i64) -> Router {
    let opts = ServerOptions { max_k, admin_token: Some("secret".into()), cors_allow_origin: None };
    build_app(dir.to_string_lossy().to_string(), opts).unwrap()
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn rebuild_request(token: &str, body: Value) -> Request<Body> {
    Request::post("/index/rebuild")
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", token)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn doc_ids(json: &Value) -> Vec<u64> {
    json["results"].as_array().unwrap().iter().map(|r| r["doc_id"].as_u64().unwrap()).collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path(), 100), "/search?q=installation&k=10").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc_ids(&json), vec![1, 2]);
    assert_eq!(json["total_hits"], 2);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0]["title_html"], "<em>Installation</em>");
    assert_eq!(results[1]["snippet"], "<em>installation</em> overview of the viewer");
}

#[tokio::test]
async fn tie_break_orders_by_document_id() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (_, body) = get(app(dir.path(), 100), "/search?q=viewer").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc_ids(&json), vec![1, 2]);
}

#[tokio::test]
async fn limits_are_validated_and_capped() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path(), 100), "/search?q=viewer&k=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&body).contains("invalid result limit"));

    let (_, body) = get(app(dir.path(), 1), "/search?q=viewer&k=50").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc_ids(&json), vec![1]);
    assert_eq!(json["total_hits"], 2);

    let (status, body) = get(app(dir.path(), 100), "/search?q=viewer&k=0").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc_ids(&serde_json::from_slice(&body).unwrap()).is_empty());
}

#[tokio::test]
async fn empty_query_returns_nothing() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, body) = get(app(dir.path(), 100), "/search?q=").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(doc_ids(&json).is_empty());
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn doc_lookup() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), 100);

    let (status, body) = get(app.clone(), "/doc/2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["path"], "introduction.rst");
    assert_eq!(json["text"], "installation overview of the viewer");

    let (status, _) = get(app, "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rebuild_requires_admin_token() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let req = rebuild_request("wrong", json!({ "documents": [] }));
    let (status, _) = call(app(dir.path(), 100), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rebuild_swaps_in_new_index() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), 100);

    let docs = json!({ "documents": [
        { "id": 7, "path": "viewer/tut2.rst", "title": "Laplace space stress analysis", "body": "stress depth profiles" }
    ]});
    let (status, body) = call(app.clone(), rebuild_request("secret", docs)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["num_docs"], 1);
    assert_eq!(json["generation"], 1);

    let (_, body) = get(app.clone(), "/search?q=stress").await;
    assert_eq!(doc_ids(&serde_json::from_slice(&body).unwrap()), vec![7]);
    let (_, body) = get(app.clone(), "/search?q=viewer").await;
    assert!(doc_ids(&serde_json::from_slice(&body).unwrap()).is_empty());

    // The rebuilt index was persisted, so a reload keeps serving it.
    let reload = Request::post("/index/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), reload).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(app, "/search?q=stress").await;
    assert_eq!(doc_ids(&serde_json::from_slice(&body).unwrap()), vec![7]);
}

#[tokio::test]
async fn failed_rebuild_keeps_serving_old_index() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), 100);

    let dup = json!({ "documents": [
        { "id": 1, "path": "a", "title": "A", "body": "x" },
        { "id": 1, "path": "b", "title": "B", "body": "y" }
    ]});
    let (status, body) = call(app.clone(), rebuild_request("secret", dup)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&body).contains("duplicate document id 1"));

    let (_, body) = get(app, "/search?q=viewer").await;
    assert_eq!(doc_ids(&serde_json::from_slice(&body).unwrap()), vec![1, 2]);
}

#[tokio::test]
async fn failed_persist_keeps_old_index_and_texts() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), 100);

    // A file squatting on the next generation's name makes the commit fail
    // after the new texts have already been written to the staging area.
    std::fs::write(dir.path().join("gen-00000002"), "").unwrap();
    let docs = json!({ "documents": [
        { "id": 1, "path": "viewer/tut2.rst", "title": "Laplace space stress analysis", "body": "replacement text" }
    ]});
    let (status, _) = call(app.clone(), rebuild_request("secret", docs)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = get(app.clone(), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["title"], "Installation");
    assert_eq!(json["text"], "install the viewer package");

    let (_, body) = get(app.clone(), "/search?q=stress").await;
    assert!(doc_ids(&serde_json::from_slice(&body).unwrap()).is_empty());

    // Nothing half-written is picked up by a reload either.
    let reload = Request::post("/index/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), reload).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(app, "/doc/1").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["text"], "install the viewer package");
}

#[tokio::test]
async fn concurrent_rebuilds_publish_consistent_generations() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), 100);

    let stress = json!({ "documents": [
        { "id": 7, "path": "viewer/tut2.rst", "title": "Laplace space stress analysis", "body": "stress depth profiles" }
    ]});
    let peak = json!({ "documents": [
        { "id": 8, "path": "viewer/tut1.rst", "title": "Simple sequential refinement", "body": "peak fitting" }
    ]});
    let (a, b) = tokio::join!(
        call(app.clone(), rebuild_request("secret", stress)),
        call(app.clone(), rebuild_request("secret", peak)),
    );
    assert_eq!((a.0, b.0), (StatusCode::OK, StatusCode::OK));

    // Whichever rebuild finished last is served, with its own text and nothing else.
    let (_, seven) = get(app.clone(), "/doc/7").await;
    let (_, eight) = get(app.clone(), "/doc/8").await;
    let seven: Value = serde_json::from_slice(&seven).unwrap();
    let eight: Value = serde_json::from_slice(&eight).unwrap();
    let served = if seven["text"].is_string() { &seven } else { &eight };
    assert!(seven["error"].is_string() ^ eight["error"].is_string());
    assert!(served["text"] == "stress depth profiles" || served["text"] == "peak fitting");

    let reload = Request::post("/index/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (_, body) = call(app.clone(), reload).await;
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["num_docs"], 1);
    let (_, again) = get(app, &format!("/doc/{}", served["doc_id"])).await;
    assert_eq!(serde_json::from_slice::<Value>(&again).unwrap()["text"], served["text"]);
}
