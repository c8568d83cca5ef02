use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::users::UserBody;
use crate::accounts::Error;
use crate::api::{ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RolesRequest {
    roles: Vec<Uuid>,
}

#[utoipa::path(
    post,
    path = "/v1/user/{id}/roles",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RolesRequest,
    responses(
        (status = 200, description = "Roles added", body = UserBody),
        (status = 404, description = "Unknown user id"),
        (status = 500, description = "Unknown role id"),
    ),
    tag = "roles"
)]
pub async fn add_roles(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RolesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    let user = state.directory.add_roles(id, &payload.roles).await?;

    Ok(Json(UserBody::from(&user)))
}

#[utoipa::path(
    put,
    path = "/v1/user/{id}/roles",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RolesRequest,
    responses(
        (status = 200, description = "Role set replaced", body = UserBody),
        (status = 404, description = "Unknown user id"),
        (status = 500, description = "Unknown role id"),
    ),
    tag = "roles"
)]
pub async fn set_roles(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RolesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    let user = state.directory.set_roles(id, &payload.roles).await?;

    Ok(Json(UserBody::from(&user)))
}

#[utoipa::path(
    delete,
    path = "/v1/user/{id}/roles",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RolesRequest,
    responses(
        (status = 200, description = "Roles removed", body = UserBody),
        (status = 404, description = "Unknown user id"),
        (status = 500, description = "Unknown role id"),
    ),
    tag = "roles"
)]
pub async fn remove_roles(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RolesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    let user = state.directory.remove_roles(id, &payload.roles).await?;

    Ok(Json(UserBody::from(&user)))
}
