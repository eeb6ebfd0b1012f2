//! Tenant scoping for all persisted records
//!
//! Every store operation carries a [`TenantScope`]. A concrete tenant only
//! sees its own rows; the admin scope (no tenant id) matches every row. The
//! predicate is always `scope IS NULL OR row.tenant = scope` — there is no
//! unscoped read path.

use std::fmt;

/// Tenant visibility for a store operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TenantScope(Option<String>);

impl TenantScope {
    /// Admin scope: matches records written under any tenant
    pub fn admin() -> Self {
        Self(None)
    }

    /// Scope restricted to a single tenant
    pub fn of(tenant_id: impl Into<String>) -> Self {
        Self(Some(tenant_id.into()))
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_none()
    }

    /// Tenant id as a nullable SQL bind parameter
    pub fn as_param(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Tenant column value for rows written under this scope
    ///
    /// Admin writes land under the empty key so the tenant column can stay
    /// NOT NULL.
    pub fn storage_key(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    /// Whether a row written under `row_tenant` is visible to this scope
    pub fn matches(&self, row_tenant: &str) -> bool {
        match &self.0 {
            None => true,
            Some(tenant) => tenant == row_tenant,
        }
    }
}

impl From<Option<String>> for TenantScope {
    fn from(tenant: Option<String>) -> Self {
        Self(tenant)
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(tenant) => write!(f, "{tenant}"),
            None => write!(f, "<admin>"),
        }
    }
}
