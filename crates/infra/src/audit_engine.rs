//! Audit trail recording and verification.
//!
//! Financial actions go into a per-tenant hash chain; administrative actions
//! are stored unchained. Both pass through the tenancy guard.

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::instrument;

use edufin_audit::{
    AdminAuditLogEntry, FinancialAuditLogEntry, NewAdminAction, NewFinancialAction,
    VerificationReport, verify_chain,
};
use edufin_core::{TenantId, UserId};
use edufin_tenancy::{TenancyGuard, TenancyViolation};

use crate::error::StoreError;
use crate::repository::AuditRepository;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Tenancy(#[from] TenancyViolation),

    /// The append failed; nothing was stored.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuditError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Tenancy(violation) => AuditError::Tenancy(violation),
            other => AuditError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditTrailEngine<R> {
    repo: R,
}

impl<R> AuditTrailEngine<R>
where
    R: AuditRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Append a financial action to `tenant_id`'s chain.
    ///
    /// The entry is built from the tail while the store holds the tenant's
    /// chain lock, so `previous_hash` is always the hash of the entry it
    /// follows.
    #[instrument(
        skip(self, action_type, details, user_id, tenant_id),
        fields(tenant_id = %tenant_id, user_id = %user_id),
        err
    )]
    pub async fn record_financial_action(
        &self,
        action_type: impl Into<String>,
        details: JsonValue,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> Result<FinancialAuditLogEntry, AuditError> {
        let action = NewFinancialAction {
            action_type: action_type.into(),
            details,
            user_id,
            tenant_id: tenant_id.clone(),
        };

        let entry = self
            .repo
            .append_financial(
                &tenant_id,
                Box::new(move |previous: Option<&FinancialAuditLogEntry>| {
                    TenancyGuard::admit(FinancialAuditLogEntry::chained(action, Utc::now(), previous))
                }),
            )
            .await?;

        tracing::info!(
            log_id = %entry.id,
            sequence = entry.sequence,
            action_type = %entry.action_type,
            "financial action recorded"
        );
        Ok(entry)
    }

    /// Store an unchained administrative entry.
    #[instrument(
        skip(self, input, user_id, tenant_id),
        fields(tenant_id = %tenant_id, action = %input.action),
        err
    )]
    pub async fn record_admin_action(
        &self,
        input: NewAdminAction,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> Result<AdminAuditLogEntry, AuditError> {
        let entry = AdminAuditLogEntry::new(input, user_id, tenant_id, Utc::now());
        let admitted = TenancyGuard::admit(entry)?;
        Ok(self.repo.insert_admin(admitted).await?)
    }

    /// Walk the tenant's chain and report every broken link.
    ///
    /// Integrity problems are returned in the report, not as errors.
    #[instrument(skip(self, tenant_id), fields(tenant_id = %tenant_id), err)]
    pub async fn verify_financial_audit_trail(
        &self,
        tenant_id: &TenantId,
    ) -> Result<VerificationReport, AuditError> {
        let entries = self.repo.financial_entries(tenant_id).await?;
        let report = verify_chain(&entries);

        if !report.is_valid {
            tracing::warn!(
                target: "security",
                tenant_id = %tenant_id,
                error_count = report.errors.len(),
                "financial audit trail failed verification"
            );
        }
        Ok(report)
    }

    pub async fn financial_trail(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<FinancialAuditLogEntry>, AuditError> {
        Ok(self.repo.financial_entries(tenant_id).await?)
    }

    pub async fn admin_trail(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AdminAuditLogEntry>, AuditError> {
        Ok(self.repo.admin_entries(tenant_id).await?)
    }
}
