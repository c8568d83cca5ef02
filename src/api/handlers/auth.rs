use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::users::UserBody;
use crate::accounts::Error;
use crate::api::{ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserBody,
}

#[utoipa::path(
    post,
    path = "/v1/auth",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "Session credential issued", body = AuthResponse),
        (status = 400, description = "Invalid credentials"),
    ),
    tag = "accounts"
)]
#[instrument(skip(state, payload))]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<AuthRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    let (token, user) = state
        .auth
        .authenticate(&payload.email, &payload.password)
        .await?;

    Ok(Json(AuthResponse {
        token,
        user: UserBody::from(&user),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/verify",
    responses(
        (status = 200, description = "Session credential is valid"),
        (status = 401, description = "Missing or invalid session credential"),
    ),
    tag = "accounts"
)]
pub async fn verify(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(Error::Unauthorized)?;

    let claims = state.auth.verify_session(credential)?;

    Ok(Json(claims))
}
