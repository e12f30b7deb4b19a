//! HTTP surface of the dashboard

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::{Dashboard, Selection, render_page};
use crate::error::{IncsegError, Result};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub metros: usize,
}

/// Router with the page at `/` and a JSON health check at `/health`
pub fn build_router(dashboard: Arc<Dashboard>) -> Router {
    Router::new()
        .route("/", get(index))
        .merge(health_routes())
        .with_state(dashboard)
}

fn health_routes() -> Router<Arc<Dashboard>> {
    Router::new().route("/health", get(health_check))
}

/// GET /health
async fn health_check(State(dashboard): State<Arc<Dashboard>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        metros: dashboard.registry().len(),
    })
}

/// GET /
///
/// Parquet reads are blocking, so the view is built on the blocking pool.
async fn index(State(dashboard): State<Arc<Dashboard>>, Query(selection): Query<Selection>) -> Response {
    let rendered =
        tokio::task::spawn_blocking(move || dashboard.view(&selection).map(|view| render_page(&view))).await;

    match rendered {
        Ok(Ok(page)) => Html(page).into_response(),
        Ok(Err(IncsegError::UnknownMetro(metro))) => (
            StatusCode::NOT_FOUND,
            format!("Metro {metro} is not in the registry"),
        )
            .into_response(),
        Ok(Err(e)) => {
            log::error!("Failed to render dashboard: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            log::error!("Dashboard task failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve the dashboard until the process is stopped
pub async fn serve(dashboard: Arc<Dashboard>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IncsegError::io(addr, e))?;
    log::info!("Dashboard listening on http://{addr}");
    axum::serve(listener, build_router(dashboard))
        .await
        .map_err(|e| IncsegError::io(addr, e))
}
