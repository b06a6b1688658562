//! Write-path tenancy guard.
//!
//! Repositories accept [`Admitted`] records only, and the only constructor
//! for `Admitted` is [`TenancyGuard::admit`] / [`TenancyGuard::admit_batch`].
//! Skipping the guard is therefore a compile error rather than a missed hook.

use core::ops::Deref;

use thiserror::Error;

use edufin_core::{Record, TenantField, TenantId};

use crate::TenantContext;

/// A record was tagged for a tenant other than the active one.
///
/// `Display` stays generic so the targeted tenant never reaches a caller;
/// both ids are available for logging.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cross-tenant write rejected ({entity})")]
pub struct TenancyViolation {
    entity: &'static str,
    attempted: TenantId,
    active: TenantId,
}

impl TenancyViolation {
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn attempted(&self) -> &TenantId {
        &self.attempted
    }

    pub fn active(&self) -> &TenantId {
        &self.active
    }
}

/// A record that passed the tenancy guard and may be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct Admitted<T>(T);

impl<T> Admitted<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Admitted<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The single choke point for the cross-tenant invariant.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenancyGuard;

impl TenancyGuard {
    /// Check (and auto-tag) one record against the ambient tenant.
    ///
    /// - no ambient tenant: admitted unchanged
    /// - no tenant field: admitted unchanged
    /// - tenant field unset: tagged with the ambient tenant
    /// - tenant field set to another tenant: rejected and logged
    pub fn admit<R: Record>(mut record: R) -> Result<Admitted<R>, TenancyViolation> {
        match TenantContext::current() {
            Some(active) => Self::check(&mut record, &active)?,
            None => {
                tracing::debug!(entity = R::KIND, "no tenant context; write admitted unchanged");
            }
        }
        Ok(Admitted(record))
    }

    /// Check a batch; either every record is admitted or none is.
    pub fn admit_batch<R: Record>(
        mut records: Vec<R>,
    ) -> Result<Vec<Admitted<R>>, TenancyViolation> {
        if let Some(active) = TenantContext::current() {
            for record in records.iter_mut() {
                Self::check(record, &active)?;
            }
        }
        Ok(records.into_iter().map(Admitted).collect())
    }

    fn check<R: Record>(record: &mut R, active: &TenantId) -> Result<(), TenancyViolation> {
        match record.tenant_field() {
            TenantField::Absent => Ok(()),
            TenantField::Fixed(t) => Self::compare::<R>(t, active),
            TenantField::Present(slot) => match slot.as_ref() {
                None => {
                    *slot = Some(active.clone());
                    Ok(())
                }
                Some(t) => Self::compare::<R>(t, active),
            },
        }
    }

    fn compare<R: Record>(attempted: &TenantId, active: &TenantId) -> Result<(), TenancyViolation> {
        if attempted == active {
            return Ok(());
        }

        tracing::error!(
            target: "security",
            attempted_tenant = %attempted,
            active_tenant = %active,
            entity = R::KIND,
            "security incident: cross-tenant write attempt rejected"
        );
        Err(TenancyViolation {
            entity: R::KIND,
            attempted: attempted.clone(),
            active: active.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Invoice {
        tenant_id: Option<TenantId>,
        total: u32,
    }

    impl Record for Invoice {
        const KIND: &'static str = "invoice";

        fn tenant_field(&mut self) -> TenantField<'_> {
            TenantField::Present(&mut self.tenant_id)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Receipt {
        tenant_id: TenantId,
    }

    impl Record for Receipt {
        const KIND: &'static str = "receipt";

        fn tenant_field(&mut self) -> TenantField<'_> {
            TenantField::Fixed(&self.tenant_id)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Setting(&'static str);

    impl Record for Setting {
        const KIND: &'static str = "setting";
    }

    fn tenant(s: &str) -> TenantId {
        TenantId::new(s).unwrap()
    }

    fn invoice(tenant_id: Option<&str>) -> Invoice {
        Invoice {
            tenant_id: tenant_id.map(tenant),
            total: 10,
        }
    }

    fn in_scope<R>(t: &str, f: impl FnOnce() -> R) -> R {
        TenantContext::new(tenant(t)).scope_sync(f)
    }

    #[test]
    fn unset_tenant_field_is_tagged_with_the_active_tenant() {
        let admitted = in_scope("a", || TenancyGuard::admit(invoice(None))).unwrap();
        assert_eq!(admitted.tenant_id, Some(tenant("a")));
    }

    #[test]
    fn matching_tenant_is_admitted() {
        let admitted = in_scope("a", || TenancyGuard::admit(invoice(Some("a")))).unwrap();
        assert_eq!(admitted.into_inner(), invoice(Some("a")));
    }

    #[test]
    fn foreign_tenant_is_rejected() {
        let err = in_scope("a", || TenancyGuard::admit(invoice(Some("b")))).unwrap_err();
        assert_eq!(err.entity(), "invoice");
        assert_eq!(err.attempted(), &tenant("b"));
        assert_eq!(err.active(), &tenant("a"));
        // Callers only ever see the generic message.
        assert_eq!(err.to_string(), "cross-tenant write rejected (invoice)");
    }

    #[test]
    fn fixed_tenant_field_is_compared_only() {
        assert!(in_scope("a", || TenancyGuard::admit(Receipt { tenant_id: tenant("a") })).is_ok());
        let err = in_scope("a", || TenancyGuard::admit(Receipt { tenant_id: tenant("b") })).unwrap_err();
        assert_eq!(err.entity(), "receipt");
    }

    #[test]
    fn without_a_context_writes_pass_unchanged() {
        let admitted = TenancyGuard::admit(invoice(Some("b"))).unwrap();
        assert_eq!(admitted.tenant_id, Some(tenant("b")));

        let untagged = TenancyGuard::admit(invoice(None)).unwrap();
        assert_eq!(untagged.tenant_id, None);
    }

    #[test]
    fn records_without_a_tenant_field_pass_through() {
        let admitted = in_scope("a", || TenancyGuard::admit(Setting("x"))).unwrap();
        assert_eq!(*admitted, Setting("x"));
    }

    #[test]
    fn batch_is_rejected_as_a_whole() {
        let res = in_scope("a", || {
            TenancyGuard::admit_batch(vec![invoice(None), invoice(Some("a")), invoice(Some("b"))])
        });
        assert!(res.is_err());

        let ok = in_scope("a", || TenancyGuard::admit_batch(vec![invoice(None), invoice(None)]))
            .unwrap();
        assert!(ok.iter().all(|r| r.tenant_id == Some(tenant("a"))));
        assert_eq!(ok[0].total, 10);
    }
}
