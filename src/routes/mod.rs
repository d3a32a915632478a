//! Rutas HTTP
//!
//! Cada recurso expone su propio `Router<AppState>`; `create_router` los
//! anida bajo `/api` y agrega el health check.

pub mod association_routes;
pub mod company_routes;
pub mod line_routes;
pub mod routing_routes;
pub mod stop_routes;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/lines", line_routes::create_line_router())
        .nest("/api/stops", stop_routes::create_stop_router())
        .nest("/api/routing", routing_routes::create_routing_router())
        .nest("/api/companies", company_routes::create_company_router())
        .nest("/api", association_routes::create_association_router())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
