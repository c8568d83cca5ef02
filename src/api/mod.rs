use crate::{
    accounts::{
        service::{Auth, Directory, Lifecycle},
        session::SessionSigner,
        tokens::TokenEngine,
    },
    cli::globals::GlobalArgs,
    notify::{self, LogSender, Notifier, WorkerConfig},
    storage::{PgStorage, Storage},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

mod error;
mod openapi;

pub mod handlers;

pub use self::error::ApiError;
pub use self::openapi::openapi;

/// Everything the handlers need, injected as a single extension.
pub struct AppState {
    pub lifecycle: Lifecycle,
    pub auth: Auth,
    pub directory: Directory,
    pub store: Arc<dyn Storage>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, globals: &GlobalArgs, notifier: Notifier) -> Self {
        let tokens = TokenEngine::new(Arc::clone(&store), globals.token_ttl_hours);
        let sessions = SessionSigner::new(&globals.session_secret, globals.session_ttl_minutes);

        Self {
            lifecycle: Lifecycle::new(Arc::clone(&store), tokens, notifier),
            auth: Auth::new(Arc::clone(&store), sessions),
            directory: Directory::new(Arc::clone(&store)),
            store,
        }
    }
}

/// Build the router with all routes and middleware registered.
#[must_use]
pub fn app(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route("/register", post(handlers::register::register))
        .route("/auth", post(handlers::auth::login))
        .route("/verify", get(handlers::auth::verify))
        .route(
            "/user/:id",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route(
            "/user/:id/roles",
            post(handlers::roles::add_roles)
                .put(handlers::roles::set_roles)
                .delete(handlers::roles::remove_roles),
        )
        .route("/confirm/:id", post(handlers::lifecycle::confirm))
        .route("/reset_confirm/:id", post(handlers::lifecycle::reset_confirm))
        .route(
            "/request_password_change",
            post(handlers::lifecycle::request_password_change),
        )
        .route(
            "/change_password/:id",
            post(handlers::lifecycle::change_password),
        );

    Router::new()
        .nest("/v1", v1)
        .route("/health", get(handlers::health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(CorsLayer::permissive())
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store: Arc<dyn Storage> = Arc::new(PgStorage::new(pool));

    // Background worker drains the notification queue; delivery is logged
    // locally until a real sender is wired in.
    let (notifier, _worker) = notify::spawn(Arc::new(LogSender), WorkerConfig::new());

    let state = Arc::new(AppState::new(store, globals, notifier));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
