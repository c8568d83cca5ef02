use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::api::AppState;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    name: String,
    version: String,
    storage: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Storage backend is healthy", body = Health),
        (status = 503, description = "Storage backend is unhealthy", body = Health)
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let storage = match state.store.healthy().await {
        Ok(()) => "ok",
        Err(err) => {
            error!("storage health check failed: {err}");

            "error"
        }
    };

    let status = if storage == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let health = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: storage.to_string(),
    };

    (status, Json(health))
}
