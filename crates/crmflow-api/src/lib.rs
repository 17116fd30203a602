// crmflow HTTP API
// Decision: Handlers stay thin; all rules live in crmflow-core
// Decision: Caller identity comes from the x-user-id header

pub mod auth;
pub mod autoruns;
pub mod campaigns;
pub mod common;
pub mod config;
pub mod error;
pub mod instances;
pub mod leads;
pub mod openapi;
pub mod state;
pub mod templates;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

pub use config::ApiConfig;
pub use openapi::ApiDoc;
pub use state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage_mode,
    })
}

/// Versioned API routes, without health, docs or middleware
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .merge(templates::routes(state.clone()))
        .merge(instances::routes(state.clone()))
        .merge(autoruns::routes(state.clone()))
        .merge(leads::routes(state.clone()))
        .merge(campaigns::routes(state))
}

/// Health endpoint plus API routes, optionally nested under a prefix
pub fn router(state: AppState, api_prefix: &str) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health))
        .with_state(state.clone());
    health_routes.merge(build_router_with_prefix(api_routes(state), api_prefix))
}

/// Build router with optional API prefix
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
