//! Store contract
//!
//! One generic contract parameterized by entity kind, rather than one
//! interface per entity. Configs (API, extract, transform, workflow) share
//! the id/payload/timestamps lifecycle and live one table per kind; runs and
//! tenant info have their own shapes.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use splice_domain::TenantInfo;

use crate::error::StoreError;
use crate::pagination::{Page, Pagination};
use crate::tenant::TenantScope;

// =============================================================================
// Entity Kinds
// =============================================================================

/// The config entity kinds sharing the generic lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Api,
    Extract,
    Transform,
    Workflow,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Workflow => "workflow",
        }
    }

    /// Backing table for this kind
    pub fn table(&self) -> &'static str {
        match self {
            Self::Api => "api_configs",
            Self::Extract => "extract_configs",
            Self::Transform => "transform_configs",
            Self::Workflow => "workflows",
        }
    }
}

/// Ids arrive URL-encoded from transport surfaces; decode before any lookup.
/// Ids that are not valid percent-encoding are used verbatim.
pub fn decode_id(id: &str) -> String {
    urlencoding::decode(id)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| id.to_string())
}

// =============================================================================
// Records
// =============================================================================

/// A persisted config entity: JSON payload plus indexed columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub id: String,
    /// Tenant storage key; empty for rows written under the admin scope
    pub tenant: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted run result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub tenant: String,
    /// Workflow id this run executed, for filtered listings
    pub config_id: Option<String>,
    pub success: bool,
    pub payload: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

// =============================================================================
// Store Traits
// =============================================================================

/// Generic lifecycle for config entities, parameterized by kind
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch one config by id under the given scope
    async fn get_config(
        &self,
        kind: EntityKind,
        id: &str,
        tenant: &TenantScope,
    ) -> Result<Option<ConfigRecord>, StoreError>;

    /// Insert or replace a config; `created_at` is preserved on update and
    /// `updated_at` is stamped
    async fn upsert_config(
        &self,
        kind: EntityKind,
        id: &str,
        payload: serde_json::Value,
        tenant: &TenantScope,
    ) -> Result<ConfigRecord, StoreError>;

    /// Delete one config; returns whether a row was removed
    async fn delete_config(
        &self,
        kind: EntityKind,
        id: &str,
        tenant: &TenantScope,
    ) -> Result<bool, StoreError>;

    /// List configs in stable id order with an exact total
    async fn list_configs(
        &self,
        kind: EntityKind,
        pagination: &Pagination,
        tenant: &TenantScope,
    ) -> Result<Page<ConfigRecord>, StoreError>;

    /// Move a config to a new id, keeping its payload and timestamps
    async fn rename_config(
        &self,
        kind: EntityKind,
        old_id: &str,
        new_id: &str,
        tenant: &TenantScope,
    ) -> Result<ConfigRecord, StoreError>;
}

/// Lifecycle for run results: written once, immutable, bulk-deletable
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn get_run(&self, id: Uuid, tenant: &TenantScope)
        -> Result<Option<RunRecord>, StoreError>;

    async fn insert_run(&self, record: RunRecord) -> Result<(), StoreError>;

    /// List runs newest-first, optionally filtered by workflow id
    async fn list_runs(
        &self,
        pagination: &Pagination,
        config_id: Option<&str>,
        tenant: &TenantScope,
    ) -> Result<Page<RunRecord>, StoreError>;

    /// Remove every run visible to the scope; returns whether any row was
    /// removed
    async fn delete_all_runs(&self, tenant: &TenantScope) -> Result<bool, StoreError>;
}

/// Administrative per-tenant record
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get_tenant_info(&self, tenant: &TenantScope) -> Result<TenantInfo, StoreError>;

    async fn upsert_tenant_info(
        &self,
        info: &TenantInfo,
        tenant: &TenantScope,
    ) -> Result<TenantInfo, StoreError>;
}

/// Everything the engine and the RPC surface need from persistence
pub trait DataStore: ConfigStore + RunStore + TenantStore {}

impl<T: ConfigStore + RunStore + TenantStore> DataStore for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_id() {
        assert_eq!(decode_id("plain-id"), "plain-id");
        assert_eq!(decode_id("spaced%20id"), "spaced id");
        assert_eq!(decode_id("a%2Fb"), "a/b");
    }

    #[test]
    fn test_kind_tables_are_distinct() {
        let kinds = [
            EntityKind::Api,
            EntityKind::Extract,
            EntityKind::Transform,
            EntityKind::Workflow,
        ];
        let tables: std::collections::HashSet<&str> = kinds.iter().map(|k| k.table()).collect();
        assert_eq!(tables.len(), kinds.len());
    }
}
