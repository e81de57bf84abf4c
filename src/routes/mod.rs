// HTTP routes: landing page, metrics, version

mod http;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};

use crate::exporter::ScrapeCoordinator;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) coordinator: Arc<ScrapeCoordinator>,
    pub(crate) metrics_path: String,
}

pub fn app(coordinator: Arc<ScrapeCoordinator>, metrics_path: &str) -> Router {
    let state = AppState {
        coordinator,
        metrics_path: metrics_path.to_string(),
    };
    Router::new()
        .route("/", get(http::landing_handler)) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route(metrics_path, get(http::metrics_handler)) // GET /metrics
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
