use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::users::UserBody;
use crate::accounts::Error;
use crate::api::{ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    email: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = UserBody),
        (status = 400, description = "Invalid input or email already registered"),
    ),
    tag = "accounts"
)]
#[instrument(skip(state, payload))]
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    let user = state
        .lifecycle
        .register(&payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(UserBody::from(&user))))
}
