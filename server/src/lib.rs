use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use search_core::query::{search, Page, SearchHit};
use search_core::{StorageError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}
fn default_page() -> usize { 1 }
fn default_per_page() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub keywords: Vec<String>,
    pub took_s: f64,
    pub total_hits: usize,
    pub page: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Opens the database at `db` and builds the router over it.
pub fn build_app(db: &str) -> Result<Router> {
    let store = Arc::new(Store::open(db)?);
    Ok(router(store))
}

pub fn router(store: Arc<Store>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
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
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index", get(index_handler))
        .with_state(AppState { store })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<SearchResponse> {
    let start = std::time::Instant::now();
    let page = Page { number: params.page.max(1), size: params.per_page.clamp(1, 100) };
    let results = search(&state.store, &params.q, page).map_err(internal)?;
    Ok(Json(SearchResponse {
        query: params.q,
        keywords: results.keywords,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: results.total_hits,
        page: page.number,
        results: results.hits,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u64>) -> ApiResult<serde_json::Value> {
    let meta = state
        .store
        .document(doc_id)
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, format!("document {doc_id} not found")))?;
    let score = state.store.page_rank(doc_id).map_err(internal)?;
    Ok(Json(serde_json::json!({
        "doc_id": doc_id,
        "url": meta.url,
        "title": meta.title,
        "crawled_at": meta.crawled_at,
        "page_rank": score,
    })))
}

/// Diagnostics: the whole resolved inverted index.
pub async fn index_handler(State(state): State<AppState>) -> ApiResult<search_core::ResolvedIndex> {
    state.store.resolve_inverted_index().map(Json).map_err(internal)
}

fn internal(e: StorageError) -> (StatusCode, String) {
    tracing::error!(error = %e, "storage failure");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
