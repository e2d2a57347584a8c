// HTTP routes: read-only passthrough over the cache and the history store, plus bulk ingest.

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::cache::SharedCache;
use crate::clock::Clock;
use crate::history::HistoryStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) cache: Arc<dyn SharedCache>,
    pub(crate) store: Arc<dyn HistoryStore>,
    pub(crate) clock: Arc<dyn Clock>,
}

pub fn app(
    cache: Arc<dyn SharedCache>,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
) -> Router {
    let state = AppState {
        cache,
        store,
        clock,
    };
    Router::new()
        .route("/", get(|| async { "dockwatch: container status history" })) // GET /
        .route("/health", get(http::health_handler)) // GET /health
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/containers/current", get(http::current_handler)) // GET current snapshot
        .route(
            "/api/containers/history",
            get(http::history_handler).post(http::ingest_handler),
        ) // GET ?hours=N, POST bulk ingest
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
