use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::accounts::Error;

/// Boundary wrapper turning domain failures into HTTP responses.
///
/// Expired tokens and unknown role references map to 500 on purpose: that is
/// the contract clients have always seen, even though a 4xx would arguably
/// fit better.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) | Error::InvalidCredentials => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Protected(_) => StatusCode::CONFLICT,
            Error::Expired | Error::UnknownReference(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self.0 {
            Error::Internal(err) => {
                error!("internal error: {err:?}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
