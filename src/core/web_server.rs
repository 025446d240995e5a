//! Lookup API and static hosting for the order web form
//!
//! Serves the wilaya/commune lookups the form needs plus the form's static
//! assets. Responses share one envelope: `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}`. Lookups go through the same cached
//! [`LookupService`] as the chat flow, so the form never hits EcoTrack
//! harder than the bot does.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::services::LookupService;

const STATIC_DIR: &str = "webapp/static";

#[derive(Clone)]
struct WebState {
    lookup: Arc<LookupService>,
}

fn ok_json(data: serde_json::Value) -> Response {
    Json(json!({"success": true, "data": data})).into_response()
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"success": false, "error": message}))).into_response()
}

/// Builds the router. Extracted from [`run_web_server`] so tests can drive
/// it without binding a socket.
pub fn router(lookup: Arc<LookupService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/api/wilayas", get(wilayas_handler))
        .route("/api/communes", get(communes_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(STATIC_DIR))
        .layer(cors)
        .with_state(WebState { lookup })
}

/// Starts the web server on `port`.
pub async fn run_web_server(port: u16, lookup: Arc<LookupService>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(lookup);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /api/wilayas   - Wilaya list (JSON)");
    log::info!("  /api/communes  - Communes of a wilaya (JSON)");
    log::info!("  /health        - Health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// GET /api/wilayas — cached wilaya reference list.
async fn wilayas_handler(State(state): State<WebState>) -> Response {
    match state.lookup.wilayas().await {
        Ok(wilayas) => match serde_json::to_value(&wilayas) {
            Ok(data) => ok_json(data),
            Err(e) => {
                log::error!("Failed to serialize wilaya list: {}", e);
                error_json(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        },
        Err(e) => {
            log::error!("Wilaya lookup failed: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.user_message())
        }
    }
}

/// GET /api/communes?wilaya_id=N — cached commune names of one wilaya.
async fn communes_handler(State(state): State<WebState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let wilaya_id = match params.get("wilaya_id").map(|v| v.parse::<u32>()) {
        Some(Ok(id)) if id > 0 => id,
        _ => return error_json(StatusCode::BAD_REQUEST, "wilaya_id is required and must be a positive integer"),
    };

    match state.lookup.communes(wilaya_id).await {
        Ok(communes) => ok_json(json!(communes)),
        Err(e) => {
            log::error!("Commune lookup failed for wilaya {}: {}", wilaya_id, e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.user_message())
        }
    }
}

async fn health_handler() -> Response {
    ok_json(json!("ok"))
}
