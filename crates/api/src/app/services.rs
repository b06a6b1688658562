use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use edufin_infra::{
    AuditRepository, AuditTrailEngine, InMemoryStore, LedgerEngine, LedgerRepository,
    PostgresStore,
};

pub type Ledger = LedgerEngine<Arc<dyn LedgerRepository>>;
pub type AuditTrail = AuditTrailEngine<Arc<dyn AuditRepository>>;

/// Engines shared by all handlers.
#[derive(Clone)]
pub struct AppServices {
    pub ledger: Ledger,
    pub audit: AuditTrail,
}

impl AppServices {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::over(store.clone(), store)
    }

    fn over(ledger: Arc<dyn LedgerRepository>, audit: Arc<dyn AuditRepository>) -> Self {
        Self {
            ledger: LedgerEngine::new(ledger),
            audit: AuditTrailEngine::new(audit),
        }
    }
}

/// Postgres when a database URL is configured, otherwise in-memory.
pub async fn build_services(database_url: Option<&str>) -> anyhow::Result<AppServices> {
    let Some(url) = database_url else {
        tracing::info!("DATABASE_URL not set; using in-memory store");
        return Ok(AppServices::in_memory());
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    let store = Arc::new(PostgresStore::new(pool));
    store
        .ensure_schema()
        .await
        .context("failed to create schema")?;
    tracing::info!("using Postgres store");

    Ok(AppServices::over(store.clone(), store))
}
