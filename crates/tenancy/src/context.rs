//! Task-scoped tenant binding.
//!
//! The active tenant lives in a tokio task-local, so it follows one logical
//! operation across every `.await` inside the scope and is never visible to
//! other tasks sharing the same worker thread.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio::task::futures::TaskLocalFuture;

use edufin_core::TenantId;

tokio::task_local! {
    static ACTIVE_TENANT: TenantId;
}

/// Tenant context for one logical operation (request, job, ...).
///
/// This is immutable; the upstream auth layer builds one per request and
/// opens a scope around all downstream work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Run `fut` with this tenant bound as current.
    ///
    /// The binding is popped when the future completes, fails, panics or is
    /// dropped. Nested scopes shadow the outer binding until they exit.
    pub fn scope<F: Future>(self, fut: F) -> TaskLocalFuture<TenantId, F> {
        ACTIVE_TENANT.scope(self.tenant_id, fut)
    }

    /// Synchronous variant of [`TenantContext::scope`].
    pub fn scope_sync<R>(self, f: impl FnOnce() -> R) -> R {
        ACTIVE_TENANT.sync_scope(self.tenant_id, f)
    }

    /// Currently bound tenant, or `None` outside any scope (background jobs,
    /// public routes).
    pub fn current() -> Option<TenantId> {
        ACTIVE_TENANT.try_with(|t| t.clone()).ok()
    }

    /// Spawn a task that inherits the caller's binding.
    ///
    /// Plain `tokio::spawn` starts with no binding; use this for continuations
    /// that belong to the current operation.
    pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match Self::current() {
            Some(tenant_id) => tokio::spawn(ACTIVE_TENANT.scope(tenant_id, fut)),
            None => tokio::spawn(fut),
        }
    }
}
