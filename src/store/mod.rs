//! Storage contracts for patterns and counters, plus the concrete backends.
//!
//! Both stores are keyed by `(organization_id, identifier_type)`. Neither
//! contains validation logic: `PatternManager` owns the rules, the stores own
//! atomicity.

pub mod memory;
pub mod postgres;
pub mod redis_counter;
pub mod retry;

use std::future::Future;

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::identifier_type::IdentifierType;
use crate::models::pattern::{NewPattern, Pattern};

pub use memory::{MemoryCounterStore, MemoryPatternStore};
pub use postgres::{PgCounterStore, PgPatternStore};
pub use redis_counter::RedisCounterStore;

/// Durable record of pattern configuration.
pub trait PatternStore: Send + Sync {
    fn get(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Pattern>, AppError>> + Send;

    fn get_active(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> impl Future<Output = Result<Option<Pattern>, AppError>> + Send;

    /// All patterns of one (org, type), oldest first.
    fn list(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> impl Future<Output = Result<Vec<Pattern>, AppError>> + Send;

    /// Insert a pattern. When it is active, its siblings are deactivated in
    /// the same atomic operation. Fails `DuplicatePattern` on a physical
    /// duplicate `(org, type, prefix, total_length)`.
    fn insert(&self, pattern: NewPattern)
        -> impl Future<Output = Result<Pattern, AppError>> + Send;

    /// Atomically write the active flags of the sibling set. Rows of the
    /// (org, type) missing from `patterns` end inactive; a named row that no
    /// longer exists fails `NotFound` and nothing is written.
    fn replace_all(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        patterns: &[Pattern],
    ) -> impl Future<Output = Result<Vec<Pattern>, AppError>> + Send;

    /// Delete a pattern only if it is inactive. Returns whether a row was removed.
    fn delete_inactive(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;
}

/// Durable, atomically incrementable counter.
pub trait CounterStore: Send + Sync {
    /// Advance the counter and return the new value. An absent counter is
    /// created holding `seed_if_absent`, which is returned as-is.
    ///
    /// Linearizable per key. Transient failures are retried within a bounded
    /// budget before surfacing `TransientContention`.
    fn atomic_increment(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        seed_if_absent: i64,
    ) -> impl Future<Output = Result<i64, AppError>> + Send;

    /// Read the counter without advancing it.
    fn current(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> impl Future<Output = Result<Option<i64>, AppError>> + Send;
}

/// Pattern store selected at startup.
#[derive(Debug, Clone)]
pub enum PatternBackend {
    Postgres(PgPatternStore),
    Memory(MemoryPatternStore),
}

impl PatternBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Cheap connectivity check for readiness probes.
    pub async fn ping(&self) -> Result<(), AppError> {
        match self {
            Self::Postgres(s) => s.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }
}

impl PatternStore for PatternBackend {
    async fn get(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        id: Uuid,
    ) -> Result<Option<Pattern>, AppError> {
        match self {
            Self::Postgres(s) => s.get(organization_id, identifier_type, id).await,
            Self::Memory(s) => s.get(organization_id, identifier_type, id).await,
        }
    }

    async fn get_active(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Option<Pattern>, AppError> {
        match self {
            Self::Postgres(s) => s.get_active(organization_id, identifier_type).await,
            Self::Memory(s) => s.get_active(organization_id, identifier_type).await,
        }
    }

    async fn list(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Vec<Pattern>, AppError> {
        match self {
            Self::Postgres(s) => s.list(organization_id, identifier_type).await,
            Self::Memory(s) => s.list(organization_id, identifier_type).await,
        }
    }

    async fn insert(&self, pattern: NewPattern) -> Result<Pattern, AppError> {
        match self {
            Self::Postgres(s) => s.insert(pattern).await,
            Self::Memory(s) => s.insert(pattern).await,
        }
    }

    async fn replace_all(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        patterns: &[Pattern],
    ) -> Result<Vec<Pattern>, AppError> {
        match self {
            Self::Postgres(s) => {
                s.replace_all(organization_id, identifier_type, patterns)
                    .await
            }
            Self::Memory(s) => {
                s.replace_all(organization_id, identifier_type, patterns)
                    .await
            }
        }
    }

    async fn delete_inactive(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        id: Uuid,
    ) -> Result<bool, AppError> {
        match self {
            Self::Postgres(s) => s.delete_inactive(organization_id, identifier_type, id).await,
            Self::Memory(s) => s.delete_inactive(organization_id, identifier_type, id).await,
        }
    }
}

/// Counter store selected at startup.
#[derive(Clone)]
pub enum CounterBackend {
    Postgres(PgCounterStore),
    Redis(RedisCounterStore),
    Memory(MemoryCounterStore),
}

impl CounterBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    /// Cheap connectivity check for readiness probes.
    pub async fn ping(&self) -> Result<(), AppError> {
        match self {
            Self::Postgres(s) => s.ping().await,
            Self::Redis(s) => s.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }
}

impl CounterStore for CounterBackend {
    async fn atomic_increment(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        seed_if_absent: i64,
    ) -> Result<i64, AppError> {
        match self {
            Self::Postgres(s) => {
                s.atomic_increment(organization_id, identifier_type, seed_if_absent)
                    .await
            }
            Self::Redis(s) => {
                s.atomic_increment(organization_id, identifier_type, seed_if_absent)
                    .await
            }
            Self::Memory(s) => {
                s.atomic_increment(organization_id, identifier_type, seed_if_absent)
                    .await
            }
        }
    }

    async fn current(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Option<i64>, AppError> {
        match self {
            Self::Postgres(s) => s.current(organization_id, identifier_type).await,
            Self::Redis(s) => s.current(organization_id, identifier_type).await,
            Self::Memory(s) => s.current(organization_id, identifier_type).await,
        }
    }
}
