use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use docsearch_core::highlight::{mark_html, snippet};
use docsearch_core::persist::{load_text, save_all, save_text, IndexPaths, IndexRoot};
use docsearch_core::{DocId, Error as SearchError, Index, IndexHandle, SearchConfig, SourceDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const SNIPPET_RADIUS: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: i64,
}
fn default_k() -> i64 { 10 }

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHitView>,
}

#[derive(Serialize, Deserialize)]
pub struct SearchHitView {
    pub doc_id: DocId,
    pub score: u64,
    pub title: String,
    pub path: String,
    /// Title with query terms wrapped in `<em>`.
    pub title_html: String,
    pub snippet: Option<String>,
}

/// A published index together with the generation directory holding its texts.
pub struct LiveIndex {
    pub index: Index,
    pub paths: IndexPaths,
}

#[derive(Clone)]
pub struct AppState {
    pub index_root: IndexRoot,
    pub live: Arc<IndexHandle<LiveIndex>>,
    /// Held for the whole build-persist-publish sequence of a rebuild or reload.
    pub rebuild_lock: Arc<Mutex<()>>,
    pub max_k: i64,
    pub admin_token: Option<String>,
}

pub struct ServerOptions {
    pub max_k: i64,
    pub admin_token: Option<String>,
    pub cors_allow_origin: Option<String>,
}

impl ServerOptions {
    pub fn from_env(max_k: i64) -> Self {
        Self {
            max_k,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        }
    }
}

pub fn build_app(index_dir: String, opts: ServerOptions) -> Result<Router> {
    let index_root = IndexRoot::new(&index_dir);
    let (index, paths) = index_root.open()?;
    tracing::info!(index_dir, generation = %paths.root.display(), num_docs = index.len(), num_terms = index.num_terms(), "index loaded");
    let app_state = AppState {
        index_root,
        live: Arc::new(IndexHandle::new(LiveIndex { index, paths })),
        rebuild_lock: Arc::new(Mutex::new(())),
        max_k: opts.max_k.max(1),
        admin_token: opts.admin_token,
    };

    // CORS: comma-separated origin list, or any origin
    let cors = match opts.cors_allow_origin {
        Some(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/rebuild", post(index_rebuild))
        .route("/index/reload", post(index_reload))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let live = state.live.current();
    let k = params.k.min(state.max_k);
    // Snippets read stored texts from disk.
    let (results, total_hits, query) = tokio::task::spawn_blocking(move || {
        let hits = live.index.search(&params.q, k).map_err(bad_request)?;
        let total_hits = live.index.total_hits(&params.q);
        let tokenizer = live.index.tokenizer();
        let results: Vec<SearchHitView> = hits
            .into_iter()
            .map(|hit| {
                let terms: BTreeSet<String> = hit.matched_terms.iter().cloned().collect();
                let snippet = load_text(&live.paths, hit.doc_id)
                    .and_then(|text| snippet(&tokenizer, &text, &terms, SNIPPET_RADIUS))
                    .map(|s| s.to_html());
                SearchHitView {
                    doc_id: hit.doc_id,
                    score: hit.score,
                    title_html: mark_html(&hit.title, &hit.title_highlights),
                    title: hit.title,
                    path: hit.path,
                    snippet,
                }
            })
            .collect();
        Ok::<_, (StatusCode, String)>((results, total_hits, params.q))
    })
    .await
    .map_err(internal)??;

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let live = state.live.current();
    let Some(doc) = live.index.document(doc_id) else {
        return Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))));
    };
    let mut obj = serde_json::json!({
        "doc_id": doc.id,
        "title": doc.title,
        "path": doc.path,
    });
    let paths = live.paths.clone();
    let text = tokio::task::spawn_blocking(move || load_text(&paths, doc_id))
        .await
        .map_err(|err| {
            tracing::error!(%err, doc_id, "loading document text failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": "internal error" })))
        })?;
    if let Some(text) = text {
        obj["text"] = serde_json::Value::String(text);
    }
    Ok(Json(obj))
}

#[derive(Deserialize)]
pub struct RebuildRequest {
    pub documents: Vec<SourceDocument>,
    #[serde(default)]
    pub config: Option<SearchConfig>,
}

// --- Admin endpoints ---
async fn index_rebuild(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RebuildRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let _guard = state.rebuild_lock.lock().await;
    let config = req.config.unwrap_or_else(|| state.live.current().index.config().clone());
    let root = state.index_root.clone();
    // Build and persist into a staging generation; readers keep the old one until the swap.
    let live = tokio::task::spawn_blocking(move || -> Result<LiveIndex, (StatusCode, String)> {
        let index = Index::build(&req.documents, config).map_err(bad_request)?;
        let staged = root.stage().map_err(internal)?;
        for doc in &req.documents {
            save_text(staged.paths(), doc.id, &doc.raw_text).map_err(internal)?;
        }
        save_all(staged.paths(), &index).map_err(internal)?;
        let paths = staged.commit().map_err(internal)?;
        Ok(LiveIndex { index, paths })
    })
    .await
    .map_err(internal)??;
    let (num_docs, num_terms) = (live.index.len(), live.index.num_terms());
    state.live.publish(live);
    Ok(Json(serde_json::json!({
        "num_docs": num_docs,
        "num_terms": num_terms,
        "generation": state.live.generation(),
    })))
}

async fn index_reload(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let _guard = state.rebuild_lock.lock().await;
    let root = state.index_root.clone();
    let (index, paths) = tokio::task::spawn_blocking(move || root.open())
        .await
        .map_err(internal)?
        .map_err(internal)?;
    let num_docs = index.len();
    state.live.publish(LiveIndex { index, paths });
    Ok(Json(serde_json::json!({ "num_docs": num_docs, "generation": state.live.generation() })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn bad_request(err: SearchError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn internal(err: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(%err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
