//! HTTP control surface
//!
//! `GET /get_state` reports the aggregated camera status, `POST /record` sets
//! the desired-recording flag and `GET /` serves the embedded control page.

use crate::hub::{AggregatedStatus, ControlHub};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_embed::RustEmbed;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

#[derive(RustEmbed)]
#[folder = "webui/"]
struct Assets;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ControlHub>,
}

/// GET /get_state - Desired flag and per-camera status
async fn get_state(State(state): State<AppState>) -> Json<AggregatedStatus> {
    Json(state.hub.aggregated_status().await)
}

/// POST /record - Body exactly `true` or `false`; anything else is ignored
async fn record(State(state): State<AppState>, body: String) -> StatusCode {
    match body.as_str() {
        "true" => state.hub.set_desired(true),
        "false" => state.hub.set_desired(false),
        other => log::debug!("Ignoring /record body {:?}", other),
    }
    StatusCode::NO_CONTENT
}

/// GET /health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Serve embedded files with MIME types
async fn static_handler(uri: Uri) -> Response {
    let mut path = uri.path().trim_start_matches('/');
    if path.is_empty() {
        path = "index.html";
    }

    match Assets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                file.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Create the HTTP router
pub fn create_router(hub: Arc<ControlHub>) -> Router {
    let state = AppState { hub };

    // The control page may be hosted elsewhere
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(static_handler))
        .route("/health", get(health_check))
        .route("/get_state", get(get_state))
        .route("/record", post(record))
        .fallback(static_handler)
        .layer(cors)
        .with_state(state)
}

/// Serve on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<ControlHub>,
    mut shutdown: watch::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(hub);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

/// Run the HTTP server
pub async fn run_http_server(
    hub: Arc<ControlHub>,
    bind: &str,
    port: u16,
    shutdown: watch::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(format!("{}:{}", bind, port)).await?;
    log::info!("HTTP server listening on {}:{}", bind, port);

    serve(listener, hub, shutdown).await?;

    log::info!("HTTP server stopped");
    Ok(())
}
