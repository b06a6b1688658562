use axum::Router;

pub mod audit;
pub mod ledger;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/ledger", ledger::router())
        .nest("/audit", audit::router())
}
