//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage selection and engine wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config.database_url.as_deref()).await?);
    Ok(router(services, &config.jwt_secret))
}

/// Router over already-built services.
pub fn router(services: Arc<services::AppServices>, jwt_secret: &str) -> Router {
    let jwt = Arc::new(edufin_auth::Hs256JwtValidator::new(jwt_secret));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require auth; handlers run inside the tenant scope.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
