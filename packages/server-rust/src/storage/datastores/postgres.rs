//! `PostgreSQL` [`Database`] implementation using sqlx.
//!
//! Each collection maps to one table:
//!
//! ```sql
//! CREATE TABLE <collection> (
//!     id          UUID PRIMARY KEY,
//!     created_at  BIGINT NOT NULL,
//!     updated_at  BIGINT,
//!     data        JSONB NOT NULL
//! )
//! ```
//!
//! Unique entity fields become expression indexes on `data->>'field'`.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use common_core::{EntityId, EntityMeta, Patch};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::storage::{Record, StoreError};
use crate::traits::{CollectionSpec, Database, Session, SharedSession};

// SQLSTATE codes that signal a constraint rejected the write.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";

/// Connection-pooled `PostgreSQL` backend.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// Connects a pool of at most `max_connections` to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the first connection cannot be made.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .test_before_acquire(true)
            .connect(url)
            .await
            .context("failed to connect to PostgreSQL")?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn register_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        let table = checked_identifier(spec.name)?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                created_at BIGINT NOT NULL,
                updated_at BIGINT,
                data JSONB NOT NULL
            )"
        );
        sqlx::query(&create)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let order_index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_created_at_idx ON {table} (created_at, id)"
        );
        sqlx::query(&order_index)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        for field in spec.unique_fields {
            let field = checked_identifier(field)?;
            let unique = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {table}_{field}_key ON {table} ((data->>'{field}'))"
            );
            sqlx::query(&unique)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
        }

        tracing::debug!(collection = table, "collection registered");
        Ok(())
    }

    async fn session(&self) -> Result<SharedSession, StoreError> {
        Ok(Arc::new(PostgresSession {
            pool: self.pool.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PostgresSession
// ---------------------------------------------------------------------------

/// Session over a [`PostgresDatabase`] pool.
///
/// Every call acquires a pooled connection and runs as its own statement or
/// transaction.
pub struct PostgresSession {
    pool: PgPool,
}

#[async_trait]
impl Session for PostgresSession {
    async fn fetch(&self, collection: &str, id: EntityId) -> Result<Option<Record>, StoreError> {
        let table = checked_identifier(collection)?;
        let query = format!("SELECT id, created_at, updated_at, data FROM {table} WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(decode_record).transpose()
    }

    async fn fetch_page(
        &self,
        collection: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let table = checked_identifier(collection)?;
        let query = format!(
            "SELECT id, created_at, updated_at, data FROM {table}
             ORDER BY created_at, id OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(i64::try_from(skip).unwrap_or(i64::MAX))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(decode_record).collect()
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        let table = checked_identifier(collection)?;
        let query = format!(
            "INSERT INTO {table} (id, created_at, updated_at, data) VALUES ($1, $2, $3, $4)
             RETURNING id, created_at, updated_at, data"
        );

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let row = sqlx::query(&query)
            .bind(record.meta.id.as_uuid())
            .bind(record.meta.created_at)
            .bind(record.meta.updated_at)
            .bind(Json(&record.data))
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;

        decode_record(&row)
    }

    async fn update(
        &self,
        collection: &str,
        id: EntityId,
        patch: &Patch,
        now: i64,
    ) -> Result<Option<Record>, StoreError> {
        let table = checked_identifier(collection)?;
        let query = format!(
            "UPDATE {table} SET data = data || $1, updated_at = GREATEST($2, created_at)
             WHERE id = $3 RETURNING id, created_at, updated_at, data"
        );
        let row = sqlx::query(&query)
            .bind(Json(patch.as_map()))
            .bind(now)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(decode_record).transpose()
    }

    async fn delete(&self, collection: &str, id: EntityId) -> Result<u64, StoreError> {
        let table = checked_identifier(collection)?;
        let query = format!("DELETE FROM {table} WHERE id = $1");
        let result = sqlx::query(&query)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn contains(&self, collection: &str, id: EntityId) -> Result<bool, StoreError> {
        let table = checked_identifier(collection)?;
        let query = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
        let exists: bool = sqlx::query_scalar(&query)
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(exists)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode_record(row: &PgRow) -> Result<Record, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(map_sqlx)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx)?;
    let updated_at: Option<i64> = row.try_get("updated_at").map_err(map_sqlx)?;
    let Json(data): Json<Map<String, Value>> = row.try_get("data").map_err(map_sqlx)?;

    Ok(Record::new(
        EntityMeta {
            id: EntityId::from_uuid(id),
            created_at,
            updated_at,
        },
        data,
    ))
}

/// Collection and field names are spliced into SQL text, so only plain
/// lowercase identifiers are accepted.
fn checked_identifier(name: &str) -> Result<&str, StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::Backend(anyhow::anyhow!(
            "invalid SQL identifier: {name:?}"
        )))
    }
}

/// Constraint violations become [`StoreError::Integrity`]; everything else
/// is a backend failure.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code();
        let is_constraint = matches!(
            code.as_deref(),
            Some(UNIQUE_VIOLATION | FOREIGN_KEY_VIOLATION | CHECK_VIOLATION | NOT_NULL_VIOLATION)
        );
        if is_constraint {
            return StoreError::integrity(
                db_err.constraint().unwrap_or("unknown"),
                db_err.message(),
            );
        }
    }
    StoreError::Backend(anyhow::Error::new(err))
}
