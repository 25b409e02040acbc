//! Router assembly
//!
//! Routes plus the admission chain in its fixed order. Layer order
//! matters: the `ServiceBuilder` lists middleware outermost first, so the
//! panic guard wraps everything and identity population runs just before
//! routing.

use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::{Router, middleware as axum_mw};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::middleware::{access_log, auth, cors, csrf, headers, panic_guard, rate_limit};
use crate::proxy;
use crate::state::AppState;

/// Request bodies are capped at 1 MiB
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the full gateway router over the given state
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/admin/providers", get(handlers::admin::providers))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/oauth/providers", get(handlers::oauth::providers))
        .route("/auth/oauth/{provider}", get(handlers::oauth::start))
        .route(
            "/auth/oauth/{provider}/callback",
            get(handlers::oauth::callback),
        )
        .route("/auth/mfa/verify", post(handlers::mfa::verify));

    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/ws-token", post(handlers::auth::ws_token))
        .route("/auth/mfa/setup", post(handlers::mfa::setup))
        .route("/auth/mfa/enable", post(handlers::mfa::enable))
        .route("/auth/mfa/disable", post(handlers::mfa::disable))
        .route(
            "/auth/sessions",
            get(handlers::sessions::list).delete(handlers::sessions::revoke_all),
        )
        .route("/auth/sessions/{id}", delete(handlers::sessions::revoke))
        .route(
            "/api/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(handlers::projects::get_project)
                .put(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
        .route(
            "/api/projects/{id}/tasks",
            get(handlers::projects::list_tasks).post(handlers::projects::create_task),
        )
        .route(
            "/api/tasks/{id}",
            put(handlers::projects::update_task).delete(handlers::projects::delete_task),
        )
        .route_layer(axum_mw::from_fn(auth::require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(proxy::forward)
        .layer(
            ServiceBuilder::new()
                .layer(panic_guard::layer())
                .layer(axum_mw::from_fn(access_log::access_log))
                .layer(axum_mw::from_fn_with_state(
                    state.clone(),
                    rate_limit::general_rate_limit,
                ))
                .layer(axum_mw::from_fn_with_state(
                    state.clone(),
                    rate_limit::mfa_rate_limit,
                ))
                .layer(cors::cors_layer(&state.config))
                .layer(axum_mw::from_fn_with_state(
                    state.clone(),
                    headers::security_headers,
                ))
                .layer(axum_mw::from_fn_with_state(state.clone(), csrf::csrf_protect))
                .layer(axum_mw::from_fn_with_state(state.clone(), auth::auth_populate))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .with_state(state)
}
