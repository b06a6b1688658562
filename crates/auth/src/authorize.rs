use std::collections::HashSet;

use thiserror::Error;

use edufin_core::{TenantId, UserId};

use crate::{Permission, Role};

/// An authenticated user acting within one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve a principal from token roles using the built-in role policy.
    pub fn from_roles(user_id: UserId, tenant_id: TenantId, roles: &[Role]) -> Self {
        Self {
            user_id,
            tenant_id,
            permissions: permissions_for_roles(roles),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

const ADMIN: &[Permission] = &[Permission::WILDCARD];
const BURSAR: &[Permission] = &[
    Permission::LEDGER_READ,
    Permission::LEDGER_WRITE,
    Permission::AUDIT_READ,
];
const AUDITOR: &[Permission] = &[Permission::LEDGER_READ, Permission::AUDIT_READ];

/// Role → permission policy.
///
/// - `admin`: everything
/// - `bursar`: post and read the ledger, read the audit trails
/// - `auditor`: read-only
///
/// Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out: Vec<Permission> = Vec::new();
    for role in roles {
        let granted = match role.as_str() {
            "admin" => ADMIN,
            "bursar" => BURSAR,
            "auditor" => AUDITOR,
            _ => &[],
        };
        for p in granted {
            if !out.contains(p) {
                out.push(p.clone());
            }
        }
    }
    out
}

/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.permissions.iter().any(Permission::is_wildcard) {
        return Ok(());
    }

    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();
    if perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
