//! PostgreSQL-backed pattern and counter stores.
//!
//! Activation swaps serialize on a transaction-scoped advisory lock per
//! (organization, identifier type); the partial unique index on active rows
//! backs the one-active invariant at the storage level. Counters advance with
//! a single upsert-with-increment statement.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::identifier_type::IdentifierType;
use crate::models::pattern::{NewPattern, Pattern};
use crate::store::retry::{self, RetryConfig};
use crate::store::{CounterStore, PatternStore};

const PHYSICAL_UNIQUE_CONSTRAINT: &str = "uq_identifier_patterns_physical";

#[derive(Debug, Clone)]
pub struct PgPatternStore {
    pool: PgPool,
}

impl PgPatternStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Serialize writers of one sibling set until the transaction ends.
async fn lock_siblings(
    conn: &mut PgConnection,
    organization_id: Uuid,
    identifier_type: IdentifierType,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
        .bind(organization_id.to_string())
        .bind(identifier_type.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl PatternStore for PgPatternStore {
    async fn get(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        id: Uuid,
    ) -> Result<Option<Pattern>, AppError> {
        let pattern = sqlx::query_as::<_, Pattern>(
            "SELECT * FROM identifier_patterns \
             WHERE id = $1 AND organization_id = $2 AND identifier_type = $3",
        )
        .bind(id)
        .bind(organization_id)
        .bind(identifier_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(pattern)
    }

    async fn get_active(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Option<Pattern>, AppError> {
        let pattern = sqlx::query_as::<_, Pattern>(
            "SELECT * FROM identifier_patterns \
             WHERE organization_id = $1 AND identifier_type = $2 AND active",
        )
        .bind(organization_id)
        .bind(identifier_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(pattern)
    }

    async fn list(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Vec<Pattern>, AppError> {
        let patterns = sqlx::query_as::<_, Pattern>(
            "SELECT * FROM identifier_patterns \
             WHERE organization_id = $1 AND identifier_type = $2 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(organization_id)
        .bind(identifier_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(patterns)
    }

    async fn insert(&self, new: NewPattern) -> Result<Pattern, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_siblings(&mut tx, new.organization_id, new.identifier_type).await?;

        if new.active {
            sqlx::query(
                "UPDATE identifier_patterns SET active = FALSE \
                 WHERE organization_id = $1 AND identifier_type = $2 AND active",
            )
            .bind(new.organization_id)
            .bind(new.identifier_type)
            .execute(&mut *tx)
            .await?;
        }

        let pattern = sqlx::query_as::<_, Pattern>(
            r#"
            INSERT INTO identifier_patterns (organization_id, identifier_type, prefix,
                total_length, initial_sequence, active, example_pattern)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.organization_id)
        .bind(new.identifier_type)
        .bind(&new.prefix)
        .bind(new.total_length)
        .bind(new.initial_sequence)
        .bind(new.active)
        .bind(&new.example_pattern)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.is_unique_violation()
                    && db_err.constraint() == Some(PHYSICAL_UNIQUE_CONSTRAINT) =>
            {
                AppError::DuplicatePattern(format!(
                    "Pattern with prefix '{}' and total length {} already exists for {}",
                    new.prefix, new.total_length, new.identifier_type
                ))
            }
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Another pattern is already active".to_string())
            }
            _ => AppError::Database(e),
        })?;

        tx.commit().await?;
        Ok(pattern)
    }

    async fn replace_all(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        patterns: &[Pattern],
    ) -> Result<Vec<Pattern>, AppError> {
        let named: Vec<Uuid> = patterns.iter().map(|p| p.id).collect();
        let active_ids: Vec<Uuid> = patterns.iter().filter(|p| p.active).map(|p| p.id).collect();

        let mut tx = self.pool.begin().await?;
        lock_siblings(&mut tx, organization_id, identifier_type).await?;

        let present: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM identifier_patterns \
             WHERE organization_id = $1 AND identifier_type = $2 AND id = ANY($3)",
        )
        .bind(organization_id)
        .bind(identifier_type)
        .bind(&named)
        .fetch_one(&mut *tx)
        .await?;

        if present != named.len() as i64 {
            // Dropping the transaction rolls it back.
            return Err(AppError::NotFound(format!(
                "{} of {} patterns no longer exist",
                named.len() as i64 - present,
                named.len()
            )));
        }

        // Deactivate first so the partial unique index never sees two actives.
        sqlx::query(
            "UPDATE identifier_patterns SET active = FALSE \
             WHERE organization_id = $1 AND identifier_type = $2 \
               AND active AND NOT (id = ANY($3))",
        )
        .bind(organization_id)
        .bind(identifier_type)
        .bind(&active_ids)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE identifier_patterns SET active = TRUE \
             WHERE organization_id = $1 AND identifier_type = $2 \
               AND NOT active AND id = ANY($3)",
        )
        .bind(organization_id)
        .bind(identifier_type)
        .bind(&active_ids)
        .execute(&mut *tx)
        .await?;

        let siblings = sqlx::query_as::<_, Pattern>(
            "SELECT * FROM identifier_patterns \
             WHERE organization_id = $1 AND identifier_type = $2 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(organization_id)
        .bind(identifier_type)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(siblings)
    }

    async fn delete_inactive(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM identifier_patterns \
             WHERE id = $1 AND organization_id = $2 AND identifier_type = $3 AND NOT active",
        )
        .bind(id)
        .bind(organization_id)
        .bind(identifier_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct PgCounterStore {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgCounterStore {
    pub fn new(pool: PgPool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl CounterStore for PgCounterStore {
    async fn atomic_increment(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        seed_if_absent: i64,
    ) -> Result<i64, AppError> {
        let pool = &self.pool;
        retry::with_retry(
            &self.retry,
            "postgres counter increment",
            retry::is_transient_sqlx,
            || async move {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO identifier_counters (organization_id, identifier_type, value)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (organization_id, identifier_type)
                    DO UPDATE SET value = identifier_counters.value + 1, updated_at = NOW()
                    RETURNING value
                    "#,
                )
                .bind(organization_id)
                .bind(identifier_type)
                .bind(seed_if_absent)
                .fetch_one(pool)
                .await
            },
        )
        .await
    }

    async fn current(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Option<i64>, AppError> {
        let value = sqlx::query_scalar::<_, i64>(
            "SELECT value FROM identifier_counters \
             WHERE organization_id = $1 AND identifier_type = $2",
        )
        .bind(organization_id)
        .bind(identifier_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }
}
