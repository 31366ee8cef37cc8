//! Liveness endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthStatus)))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    /// Always `"ok"` while the process serves requests.
    pub status: String,
    pub version: String,
    /// Configured history backend (`"supabase"` or `"memory"`).
    pub store: String,
    /// Gemini model that replies are requested from.
    pub model: String,
}

/// Report liveness and which backends this instance relays to.
///
/// Reads configuration only; neither the store nor the model is contacted, so
/// a healthy answer says nothing about upstream availability.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthStatus)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        store: state.config.store_backend.as_str().into(),
        model: state.config.gemini_model.clone(),
    })
}
