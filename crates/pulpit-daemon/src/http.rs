//! Host-facing JSON API.  Reads return the latest published snapshot;
//! writes forward an intent to the owning loop and return `202 Accepted`
//! without waiting for it to be applied.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use pulpit_core::catalog::{CatalogHandle, CatalogSnapshot, SeriesFilter};
use pulpit_core::monitor::{MonitorHandle, MonitorSnapshot};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::log_buffer::LogBuffer;

#[derive(Clone)]
pub struct HttpState {
    /// `None` when the live monitor is disabled in config.
    pub monitor: Option<MonitorHandle>,
    pub catalog: CatalogHandle,
    pub log: LogBuffer,
}

#[derive(Deserialize)]
struct SearchBody {
    query: String,
}

#[derive(Deserialize)]
struct FilterBody {
    series: SeriesFilter,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/live", get(get_live))
        .route("/api/live/dismiss", post(dismiss_notification))
        .route("/api/sermons", get(get_sermons))
        .route("/api/sermons/refresh", post(refresh))
        .route("/api/sermons/search", post(search))
        .route("/api/sermons/filter", post(filter))
        .route("/api/sermons/page/:page", post(set_page))
        .route("/api/sermons/select/:id", post(select))
        .route("/api/sermons/select", delete(clear_selection))
        .route("/api/log", get(get_log))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state: HttpState,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_live(State(state): State<HttpState>) -> Result<Json<MonitorSnapshot>, StatusCode> {
    let monitor = state.monitor.ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(monitor.snapshot()))
}

async fn dismiss_notification(State(state): State<HttpState>) -> StatusCode {
    match state.monitor {
        Some(monitor) => {
            info!("HTTP API: Dismiss notification");
            monitor.dismiss_notification().await;
            StatusCode::ACCEPTED
        }
        None => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn get_sermons(State(state): State<HttpState>) -> Json<CatalogSnapshot> {
    Json(state.catalog.snapshot())
}

async fn refresh(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Refresh catalog");
    state.catalog.refresh().await;
    StatusCode::ACCEPTED
}

async fn search(State(state): State<HttpState>, Json(body): Json<SearchBody>) -> StatusCode {
    info!("HTTP API: Search {:?}", body.query);
    state.catalog.set_search(body.query).await;
    StatusCode::ACCEPTED
}

async fn filter(State(state): State<HttpState>, Json(body): Json<FilterBody>) -> StatusCode {
    info!("HTTP API: Filter series {}", body.series.label());
    state.catalog.set_filter(body.series).await;
    StatusCode::ACCEPTED
}

async fn set_page(State(state): State<HttpState>, Path(page): Path<usize>) -> StatusCode {
    if page == 0 {
        return StatusCode::BAD_REQUEST;
    }
    state.catalog.set_page(page).await;
    StatusCode::ACCEPTED
}

async fn select(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    info!("HTTP API: Select sermon {}", id);
    state.catalog.select(id).await;
    StatusCode::ACCEPTED
}

async fn clear_selection(State(state): State<HttpState>) -> StatusCode {
    state.catalog.clear_selection().await;
    StatusCode::ACCEPTED
}

async fn get_log(State(state): State<HttpState>) -> Json<Vec<String>> {
    Json(state.log.lines())
}
