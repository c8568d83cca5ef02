use utoipa::OpenApi;

use super::handlers::{auth, health, lifecycle, register, roles, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "varco",
        description = "User accounts and authentication service",
    ),
    paths(
        health::health,
        register::register,
        auth::login,
        auth::verify,
        users::get_user,
        users::update_user,
        users::delete_user,
        roles::add_roles,
        roles::set_roles,
        roles::remove_roles,
        lifecycle::confirm,
        lifecycle::reset_confirm,
        lifecycle::request_password_change,
        lifecycle::change_password,
    ),
    components(schemas(
        health::Health,
        register::RegisterRequest,
        auth::AuthRequest,
        auth::AuthResponse,
        users::UserBody,
        users::UserUpdateRequest,
        roles::RolesRequest,
        lifecycle::EmailRequest,
        lifecycle::PasswordRequest,
    )),
    tags(
        (name = "accounts", description = "Registration and authentication"),
        (name = "lifecycle", description = "Verification and password-reset tokens"),
        (name = "users", description = "User CRUD"),
        (name = "roles", description = "Role assignment"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/health",
            "/v1/register",
            "/v1/auth",
            "/v1/verify",
            "/v1/user/{id}",
            "/v1/user/{id}/roles",
            "/v1/confirm/{id}",
            "/v1/reset_confirm/{id}",
            "/v1/request_password_change",
            "/v1/change_password/{id}",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}
