//! In-memory store backend
//!
//! Backs dev servers and tests. Satisfies the same contract as the
//! PostgreSQL backend, including tenant scoping and stable list ordering.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use splice_domain::TenantInfo;

use crate::error::StoreError;
use crate::pagination::{Page, Pagination};
use crate::tenant::TenantScope;

use super::{decode_id, ConfigRecord, ConfigStore, EntityKind, RunRecord, RunStore, TenantStore};

type ConfigKey = (EntityKind, String, String);

/// In-memory implementation of the store contract
#[derive(Default)]
pub struct MemoryStore {
    configs: RwLock<HashMap<ConfigKey, ConfigRecord>>,
    runs: RwLock<Vec<RunRecord>>,
    tenants: RwLock<HashMap<String, TenantInfo>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: EntityKind, tenant: &str, id: &str) -> ConfigKey {
        (kind, tenant.to_string(), id.to_string())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config(
        &self,
        kind: EntityKind,
        id: &str,
        tenant: &TenantScope,
    ) -> Result<Option<ConfigRecord>, StoreError> {
        let id = decode_id(id);
        let configs = self.configs.read().await;
        let mut matching: Vec<&ConfigRecord> = configs
            .iter()
            .filter(|((k, row_tenant, row_id), _)| {
                *k == kind && *row_id == id && tenant.matches(row_tenant)
            })
            .map(|(_, record)| record)
            .collect();
        // Admin lookups can see the same id under several tenants; pick the
        // lowest tenant key for determinism.
        matching.sort_by(|a, b| a.tenant.cmp(&b.tenant));
        Ok(matching.first().map(|r| (*r).clone()))
    }

    async fn upsert_config(
        &self,
        kind: EntityKind,
        id: &str,
        payload: serde_json::Value,
        tenant: &TenantScope,
    ) -> Result<ConfigRecord, StoreError> {
        let id = decode_id(id);
        let now = Utc::now();
        let mut configs = self.configs.write().await;
        let key = Self::key(kind, tenant.storage_key(), &id);

        let record = match configs.get(&key) {
            Some(existing) => ConfigRecord {
                id: id.clone(),
                tenant: tenant.storage_key().to_string(),
                payload,
                created_at: existing.created_at,
                updated_at: now,
            },
            None => ConfigRecord {
                id: id.clone(),
                tenant: tenant.storage_key().to_string(),
                payload,
                created_at: now,
                updated_at: now,
            },
        };
        configs.insert(key, record.clone());
        Ok(record)
    }

    async fn delete_config(
        &self,
        kind: EntityKind,
        id: &str,
        tenant: &TenantScope,
    ) -> Result<bool, StoreError> {
        let id = decode_id(id);
        let mut configs = self.configs.write().await;
        let keys: Vec<ConfigKey> = configs
            .iter()
            .filter(|((k, row_tenant, row_id), _)| {
                *k == kind && *row_id == id && tenant.matches(row_tenant)
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            configs.remove(key);
        }
        Ok(!keys.is_empty())
    }

    async fn list_configs(
        &self,
        kind: EntityKind,
        pagination: &Pagination,
        tenant: &TenantScope,
    ) -> Result<Page<ConfigRecord>, StoreError> {
        let configs = self.configs.read().await;
        let mut matching: Vec<&ConfigRecord> = configs
            .iter()
            .filter(|((k, row_tenant, _), _)| *k == kind && tenant.matches(row_tenant))
            .map(|(_, record)| record)
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(pagination.clamped_offset() as usize)
            .take(pagination.clamped_limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn rename_config(
        &self,
        kind: EntityKind,
        old_id: &str,
        new_id: &str,
        tenant: &TenantScope,
    ) -> Result<ConfigRecord, StoreError> {
        let old_id = decode_id(old_id);
        let new_id = decode_id(new_id);
        let mut configs = self.configs.write().await;

        let old_key = configs
            .keys()
            .find(|(k, row_tenant, row_id)| {
                *k == kind && *row_id == old_id && tenant.matches(row_tenant)
            })
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: kind.as_str(),
                id: old_id.clone(),
            })?;

        let new_key = Self::key(kind, &old_key.1, &new_id);
        if configs.contains_key(&new_key) {
            return Err(StoreError::AlreadyExists {
                kind: kind.as_str(),
                id: new_id,
            });
        }

        let mut record = configs.remove(&old_key).expect("key just found");
        record.id = new_id;
        record.updated_at = Utc::now();
        configs.insert(new_key, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn get_run(
        &self,
        id: Uuid,
        tenant: &TenantScope,
    ) -> Result<Option<RunRecord>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .find(|r| r.id == id && tenant.matches(&r.tenant))
            .cloned())
    }

    async fn insert_run(&self, record: RunRecord) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        if runs.iter().any(|r| r.id == record.id) {
            return Err(StoreError::AlreadyExists {
                kind: "run",
                id: record.id.to_string(),
            });
        }
        runs.push(record);
        Ok(())
    }

    async fn list_runs(
        &self,
        pagination: &Pagination,
        config_id: Option<&str>,
        tenant: &TenantScope,
    ) -> Result<Page<RunRecord>, StoreError> {
        let config_id = config_id.map(decode_id);
        let runs = self.runs.read().await;
        let mut matching: Vec<&RunRecord> = runs
            .iter()
            .filter(|r| {
                tenant.matches(&r.tenant)
                    && config_id
                        .as_deref()
                        .map(|cid| r.config_id.as_deref() == Some(cid))
                        .unwrap_or(true)
            })
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(pagination.clamped_offset() as usize)
            .take(pagination.clamped_limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn delete_all_runs(&self, tenant: &TenantScope) -> Result<bool, StoreError> {
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|r| !tenant.matches(&r.tenant));
        Ok(runs.len() < before)
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn get_tenant_info(&self, tenant: &TenantScope) -> Result<TenantInfo, StoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant.storage_key())
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_tenant_info(
        &self,
        info: &TenantInfo,
        tenant: &TenantScope,
    ) -> Result<TenantInfo, StoreError> {
        let mut tenants = self.tenants.write().await;
        tenants.insert(tenant.storage_key().to_string(), info.clone());
        Ok(info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(n: i64) -> serde_json::Value {
        serde_json::json!({"n": n})
    }

    #[tokio::test]
    async fn test_upsert_get_roundtrip() {
        let store = MemoryStore::new();
        let tenant = TenantScope::of("t1");

        store
            .upsert_config(EntityKind::Workflow, "w1", payload(1), &tenant)
            .await
            .unwrap();

        let found = store
            .get_config(EntityKind::Workflow, "w1", &tenant)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.payload, payload(1));
        assert_eq!(found.tenant, "t1");
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let store = MemoryStore::new();
        let tenant = TenantScope::of("t1");

        let first = store
            .upsert_config(EntityKind::Api, "a", payload(1), &tenant)
            .await
            .unwrap();
        let second = store
            .upsert_config(EntityKind::Api, "a", payload(2), &tenant)
            .await
            .unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.payload, payload(2));
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let store = MemoryStore::new();
        store
            .upsert_config(EntityKind::Workflow, "w1", payload(1), &TenantScope::of("t1"))
            .await
            .unwrap();

        let other = store
            .get_config(EntityKind::Workflow, "w1", &TenantScope::of("t2"))
            .await
            .unwrap();
        assert!(other.is_none());

        let listed = store
            .list_configs(EntityKind::Workflow, &Pagination::default(), &TenantScope::of("t2"))
            .await
            .unwrap();
        assert!(listed.items.is_empty());
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_admin_scope_sees_all_tenants() {
        let store = MemoryStore::new();
        store
            .upsert_config(EntityKind::Workflow, "w1", payload(1), &TenantScope::of("t1"))
            .await
            .unwrap();
        store
            .upsert_config(EntityKind::Workflow, "w2", payload(2), &TenantScope::of("t2"))
            .await
            .unwrap();

        let listed = store
            .list_configs(EntityKind::Workflow, &Pagination::default(), &TenantScope::admin())
            .await
            .unwrap();
        assert_eq!(listed.total, 2);
    }

    #[tokio::test]
    async fn test_delete_roundtrip() {
        let store = MemoryStore::new();
        let tenant = TenantScope::of("t1");
        store
            .upsert_config(EntityKind::Workflow, "w1", payload(1), &tenant)
            .await
            .unwrap();

        assert!(store
            .delete_config(EntityKind::Workflow, "w1", &tenant)
            .await
            .unwrap());
        assert!(store
            .get_config(EntityKind::Workflow, "w1", &tenant)
            .await
            .unwrap()
            .is_none());
        assert!(!store
            .delete_config(EntityKind::Workflow, "w1", &tenant)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_ids_are_url_decoded() {
        let store = MemoryStore::new();
        let tenant = TenantScope::of("t1");
        store
            .upsert_config(EntityKind::Workflow, "my workflow", payload(1), &tenant)
            .await
            .unwrap();

        let found = store
            .get_config(EntityKind::Workflow, "my%20workflow", &tenant)
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_list_is_id_ordered_with_exact_total() {
        let store = MemoryStore::new();
        let tenant = TenantScope::of("t1");
        for id in ["c", "a", "b"] {
            store
                .upsert_config(EntityKind::Api, id, payload(0), &tenant)
                .await
                .unwrap();
        }

        let page = store
            .list_configs(EntityKind::Api, &Pagination::new(2, 0), &tenant)
            .await
            .unwrap();
        let ids: Vec<&str> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(page.total, 3);
        assert!(page.has_more());
    }

    #[tokio::test]
    async fn test_rename_config() {
        let store = MemoryStore::new();
        let tenant = TenantScope::of("t1");
        store
            .upsert_config(EntityKind::Api, "old", payload(1), &tenant)
            .await
            .unwrap();

        let renamed = store
            .rename_config(EntityKind::Api, "old", "new", &tenant)
            .await
            .unwrap();
        assert_eq!(renamed.id, "new");
        assert!(store
            .get_config(EntityKind::Api, "old", &tenant)
            .await
            .unwrap()
            .is_none());

        let missing = store
            .rename_config(EntityKind::Api, "old", "newer", &tenant)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_runs_filter_and_bulk_delete() {
        let store = MemoryStore::new();
        let t1 = TenantScope::of("t1");

        for (config_id, minutes_ago) in [("w1", 2), ("w1", 1), ("w2", 0)] {
            let started = Utc::now() - chrono::Duration::minutes(minutes_ago);
            store
                .insert_run(RunRecord {
                    id: Uuid::new_v4(),
                    tenant: "t1".to_string(),
                    config_id: Some(config_id.to_string()),
                    success: true,
                    payload: payload(0),
                    started_at: started,
                    completed_at: started,
                })
                .await
                .unwrap();
        }

        let all = store
            .list_runs(&Pagination::default(), None, &t1)
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        // Newest first
        assert_eq!(all.items[0].config_id.as_deref(), Some("w2"));

        let filtered = store
            .list_runs(&Pagination::default(), Some("w1"), &t1)
            .await
            .unwrap();
        assert_eq!(filtered.total, 2);

        assert!(store.delete_all_runs(&t1).await.unwrap());
        let after = store
            .list_runs(&Pagination::default(), None, &t1)
            .await
            .unwrap();
        assert_eq!(after.total, 0);
    }

    #[tokio::test]
    async fn test_tenant_info_defaults_and_upsert() {
        let store = MemoryStore::new();
        let tenant = TenantScope::of("t1");

        let info = store.get_tenant_info(&tenant).await.unwrap();
        assert!(info.email.is_none());
        assert!(!info.email_entry_skipped);

        store
            .upsert_tenant_info(
                &TenantInfo {
                    email: Some("ops@example.com".to_string()),
                    email_entry_skipped: false,
                },
                &tenant,
            )
            .await
            .unwrap();
        let info = store.get_tenant_info(&tenant).await.unwrap();
        assert_eq!(info.email.as_deref(), Some("ops@example.com"));
    }
}
