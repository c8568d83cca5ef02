use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::accounts::{models::User, service::UserUpdate, Error};
use crate::api::{ApiError, AppState};

/// User representation returned by the API; the credential hash never
/// appears here.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserBody {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
    pub roles: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserBody {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            is_verified: user.is_verified,
            roles: user.roles.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/v1/user/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = UserBody),
        (status = 404, description = "Unknown user id"),
    ),
    tag = "users"
)]
pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.directory.get_user(id).await?;

    Ok(Json(UserBody::from(&user)))
}

#[utoipa::path(
    put,
    path = "/v1/user/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = UserBody),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Unknown user id"),
    ),
    tag = "users"
)]
pub async fn update_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<UserUpdateRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(Error::Validation("missing payload".to_string()).into());
    };

    let user = state
        .directory
        .update_user(
            id,
            UserUpdate {
                email: payload.email,
                password: payload.password,
                is_active: payload.is_active,
            },
        )
        .await?;

    Ok(Json(UserBody::from(&user)))
}

#[utoipa::path(
    delete,
    path = "/v1/user/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "Unknown user id"),
        (status = 409, description = "User still owns lifecycle tokens"),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.directory.delete_user(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
