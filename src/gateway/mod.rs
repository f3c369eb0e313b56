//! HTTP Gateway
//!
//! Routes:
//! - `GET  /api/v1/health`
//! - `POST /api/v1/users`, `POST /api/v1/users/login`
//! - `/api/v1/accounts/**`, `/api/v1/transfers/**` (JWT required)
//! - Swagger UI at `/docs`

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::jwt_auth_middleware;
use state::AppState;

/// Build the complete router
pub fn build_router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Public Routes (no auth required)
    // ==========================================================================
    let public_routes = Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .route("/api/v1/users", post(handlers::create_user))
        .route("/api/v1/users/login", post(handlers::login));

    // ==========================================================================
    // Private Routes (JWT required)
    // ==========================================================================
    let private_routes = Router::new()
        .route(
            "/api/v1/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route(
            "/api/v1/accounts/{id}",
            get(handlers::get_account).delete(handlers::delete_account),
        )
        .route("/api/v1/accounts/{id}/entries", get(handlers::list_entries))
        .route("/api/v1/transfers", post(handlers::create_transfer))
        .route("/api/v1/transfers/{id}", get(handlers::get_transfer))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(private_routes)
        .with_state(state)
        // OpenAPI / Swagger UI (stateless, added after with_state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start HTTP Gateway server
///
/// Runs until Ctrl-C.
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;

    tracing::info!(%addr, "Gateway listening");
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Gateway server error")?;

    Ok(())
}
