//! PostgreSQL store backend
//!
//! One table per config kind plus `runs` and `tenant_info`. Payloads are
//! JSONB with indexed id/tenant/timestamp columns. Schema initialization is
//! idempotent. Table names come from [`EntityKind::table`], never from
//! caller input; all values are bound parameters.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use splice_domain::TenantInfo;

use crate::error::StoreError;
use crate::pagination::{Page, Pagination};
use crate::tenant::TenantScope;

use super::{decode_id, ConfigRecord, ConfigStore, EntityKind, RunRecord, RunStore, TenantStore};

const CONFIG_COLUMNS: &str = "id, tenant, payload, created_at, updated_at";
const RUN_COLUMNS: &str = "id, tenant, config_id, success, payload, started_at, completed_at";

// Every store operation holds a connection for a single statement, so a
// small pool recycles fast even under concurrent runs. A run archival and
// a handful of config lookups per execution never need more than this.
const MAX_CONNECTIONS: u32 = 10;
const MIN_CONNECTIONS: u32 = 2;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// PostgreSQL implementation of the store contract
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the backend and verify the connection with a ping, so a
    /// bad `DATABASE_URL` fails at startup rather than on the first run.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .min_connections(MIN_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(IDLE_TIMEOUT)
            .connect(url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for kind in [
            EntityKind::Api,
            EntityKind::Extract,
            EntityKind::Transform,
            EntityKind::Workflow,
        ] {
            let table = kind.table();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT NOT NULL,
                    tenant TEXT NOT NULL DEFAULT '',
                    payload JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (id, tenant)
                )
                "#
            ))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id UUID PRIMARY KEY,
                tenant TEXT NOT NULL DEFAULT '',
                config_id TEXT,
                success BOOLEAN NOT NULL,
                payload JSONB NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS runs_tenant_started_idx ON runs (tenant, started_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS runs_config_idx ON runs (config_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenant_info (
                tenant TEXT PRIMARY KEY,
                email TEXT UNIQUE,
                email_entry_skipped BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn get_config(
        &self,
        kind: EntityKind,
        id: &str,
        tenant: &TenantScope,
    ) -> Result<Option<ConfigRecord>, StoreError> {
        let id = decode_id(id);
        let row = sqlx::query_as::<_, ConfigRow>(&format!(
            r#"
            SELECT {CONFIG_COLUMNS}
            FROM {table}
            WHERE id = $1 AND ($2::TEXT IS NULL OR tenant = $2)
            ORDER BY tenant
            LIMIT 1
            "#,
            table = kind.table(),
        ))
        .bind(&id)
        .bind(tenant.as_param())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ConfigRecord::from))
    }

    async fn upsert_config(
        &self,
        kind: EntityKind,
        id: &str,
        payload: serde_json::Value,
        tenant: &TenantScope,
    ) -> Result<ConfigRecord, StoreError> {
        let id = decode_id(id);
        let row = sqlx::query_as::<_, ConfigRow>(&format!(
            r#"
            INSERT INTO {table} (id, tenant, payload, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (id, tenant)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()
            RETURNING {CONFIG_COLUMNS}
            "#,
            table = kind.table(),
        ))
        .bind(&id)
        .bind(tenant.storage_key())
        .bind(&payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn delete_config(
        &self,
        kind: EntityKind,
        id: &str,
        tenant: &TenantScope,
    ) -> Result<bool, StoreError> {
        let id = decode_id(id);
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE id = $1 AND ($2::TEXT IS NULL OR tenant = $2)",
            table = kind.table(),
        ))
        .bind(&id)
        .bind(tenant.as_param())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_configs(
        &self,
        kind: EntityKind,
        pagination: &Pagination,
        tenant: &TenantScope,
    ) -> Result<Page<ConfigRecord>, StoreError> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {table} WHERE ($1::TEXT IS NULL OR tenant = $1)",
            table = kind.table(),
        ))
        .bind(tenant.as_param())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ConfigRow>(&format!(
            r#"
            SELECT {CONFIG_COLUMNS}
            FROM {table}
            WHERE ($1::TEXT IS NULL OR tenant = $1)
            ORDER BY id, tenant
            LIMIT $2 OFFSET $3
            "#,
            table = kind.table(),
        ))
        .bind(tenant.as_param())
        .bind(pagination.clamped_limit())
        .bind(pagination.clamped_offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(ConfigRecord::from).collect();
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
        let row = sqlx::query_as::<_, ConfigRow>(&format!(
            r#"
            UPDATE {table}
            SET id = $2, updated_at = NOW()
            WHERE id = $1 AND ($3::TEXT IS NULL OR tenant = $3)
            RETURNING {CONFIG_COLUMNS}
            "#,
            table = kind.table(),
        ))
        .bind(&old_id)
        .bind(&new_id)
        .bind(tenant.as_param())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists {
                kind: kind.as_str(),
                id: new_id.clone(),
            },
            _ => StoreError::Database(e),
        })?;

        row.map(ConfigRecord::from).ok_or(StoreError::NotFound {
            kind: kind.as_str(),
            id: old_id,
        })
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn get_run(
        &self,
        id: Uuid,
        tenant: &TenantScope,
    ) -> Result<Option<RunRecord>, StoreError> {
        let row = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM runs
            WHERE id = $1 AND ($2::TEXT IS NULL OR tenant = $2)
            "#,
        ))
        .bind(id)
        .bind(tenant.as_param())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RunRecord::from))
    }

    async fn insert_run(&self, record: RunRecord) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO runs ({RUN_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        ))
        .bind(record.id)
        .bind(&record.tenant)
        .bind(&record.config_id)
        .bind(record.success)
        .bind(&record.payload)
        .bind(record.started_at)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists {
                kind: "run",
                id: record.id.to_string(),
            },
            _ => StoreError::Database(e),
        })?;

        Ok(())
    }

    async fn list_runs(
        &self,
        pagination: &Pagination,
        config_id: Option<&str>,
        tenant: &TenantScope,
    ) -> Result<Page<RunRecord>, StoreError> {
        let config_id = config_id.map(decode_id);

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM runs
            WHERE ($1::TEXT IS NULL OR tenant = $1)
              AND ($2::TEXT IS NULL OR config_id = $2)
            "#,
        )
        .bind(tenant.as_param())
        .bind(config_id.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM runs
            WHERE ($1::TEXT IS NULL OR tenant = $1)
              AND ($2::TEXT IS NULL OR config_id = $2)
            ORDER BY started_at DESC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(tenant.as_param())
        .bind(config_id.as_deref())
        .bind(pagination.clamped_limit())
        .bind(pagination.clamped_offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(RunRecord::from).collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn delete_all_runs(&self, tenant: &TenantScope) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM runs WHERE ($1::TEXT IS NULL OR tenant = $1)")
            .bind(tenant.as_param())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TenantStore for PgStore {
    async fn get_tenant_info(&self, tenant: &TenantScope) -> Result<TenantInfo, StoreError> {
        let row = sqlx::query(
            "SELECT email, email_entry_skipped FROM tenant_info WHERE tenant = $1",
        )
        .bind(tenant.storage_key())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|r| TenantInfo {
                email: r.get("email"),
                email_entry_skipped: r.get("email_entry_skipped"),
            })
            .unwrap_or_default())
    }

    async fn upsert_tenant_info(
        &self,
        info: &TenantInfo,
        tenant: &TenantScope,
    ) -> Result<TenantInfo, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO tenant_info (tenant, email, email_entry_skipped)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant)
            DO UPDATE SET email = EXCLUDED.email,
                          email_entry_skipped = EXCLUDED.email_entry_skipped
            RETURNING email, email_entry_skipped
            "#,
        )
        .bind(tenant.storage_key())
        .bind(&info.email)
        .bind(info.email_entry_skipped)
        .fetch_one(&self.pool)
        .await?;

        Ok(TenantInfo {
            email: row.get("email"),
            email_entry_skipped: row.get("email_entry_skipped"),
        })
    }
}

// Internal row types for SQLx mapping

#[derive(sqlx::FromRow)]
struct ConfigRow {
    id: String,
    tenant: String,
    payload: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ConfigRow> for ConfigRecord {
    fn from(row: ConfigRow) -> Self {
        Self {
            id: row.id,
            tenant: row.tenant,
            payload: row.payload,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    tenant: String,
    config_id: Option<String>,
    success: bool,
    payload: serde_json::Value,
    started_at: chrono::DateTime<chrono::Utc>,
    completed_at: chrono::DateTime<chrono::Utc>,
}

impl From<RunRow> for RunRecord {
    fn from(row: RunRow) -> Self {
        Self {
            id: row.id,
            tenant: row.tenant,
            config_id: row.config_id,
            success: row.success,
            payload: row.payload,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}
