use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::accounts::Error;
use crate::api::{ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordRequest {
    password: String,
}

#[utoipa::path(
    post,
    path = "/v1/confirm/{id}",
    params(("id" = Uuid, Path, description = "VERIFY token id")),
    responses(
        (status = 200, description = "Email confirmed, token consumed"),
        (status = 404, description = "Unknown token id"),
        (status = 500, description = "Token expired"),
    ),
    tag = "lifecycle"
)]
#[instrument(skip(state))]
pub async fn confirm(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.lifecycle.confirm_email(id).await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/v1/reset_confirm/{id}",
    params(("id" = Uuid, Path, description = "Previously issued token id")),
    request_body = EmailRequest,
    responses(
        (status = 200, description = "New verification token issued"),
        (status = 404, description = "Unknown email"),
    ),
    tag = "lifecycle"
)]
pub async fn reset_confirm(
    Extension(state): Extension<Arc<AppState>>,
    // The path id is accepted for route compatibility; reissue is keyed by
    // the email in the body and drops every token the user owns anyway.
    Path(_id): Path<Uuid>,
    payload: Option<Json<EmailRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    state.lifecycle.reissue_verification(&payload.email).await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/v1/request_password_change",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset token issued and queued"),
        (status = 404, description = "Unknown email"),
    ),
    tag = "lifecycle"
)]
pub async fn request_password_change(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<EmailRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    state
        .lifecycle
        .request_password_change(&payload.email)
        .await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/v1/change_password/{id}",
    params(("id" = Uuid, Path, description = "RESET token id")),
    request_body = PasswordRequest,
    responses(
        (status = 200, description = "Password changed, token consumed"),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Unknown token id"),
        (status = 500, description = "Token expired"),
    ),
    tag = "lifecycle"
)]
#[instrument(skip(state, payload))]
pub async fn change_password(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<PasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    state
        .lifecycle
        .change_password(id, &payload.password)
        .await?;

    Ok(StatusCode::OK)
}
