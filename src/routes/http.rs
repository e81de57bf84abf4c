// GET handlers: landing page, version, metrics

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse},
};

use super::AppState;
use crate::version::{NAME, VERSION};

/// GET /: static page pointing at the metrics path.
pub(super) async fn landing_handler(State(state): State<AppState>) -> impl IntoResponse {
    Html(format!(
        "<html>\n<head><title>UCloud CDN Exporter</title></head>\n<body>\n\
         <h1>UCloud CDN Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         <p>{NAME} {VERSION}</p>\n\
         </body>\n</html>\n",
        path = state.metrics_path,
    ))
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /metrics: runs a fresh scrape. Partial upstream failures still return 200.
pub(super) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.coordinator.render().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, operation = "encode_metrics", "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to encode metrics\n",
            )
                .into_response()
        }
    }
}
