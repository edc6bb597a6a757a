pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use config::{AppConfig, StorageBackend};
use errors::AppError;
use services::allocation::AllocationService;
use services::consumer::standard_formats;
use services::pattern::PatternManager;
use store::{
    CounterBackend, MemoryCounterStore, MemoryPatternStore, PatternBackend, PgCounterStore,
    PgPatternStore, RedisCounterStore,
};

pub type Patterns = PatternManager<PatternBackend>;
pub type Allocator = AllocationService<PatternBackend, CounterBackend>;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub allocator: Allocator,
}

impl AppState {
    pub fn new(config: AppConfig, patterns: PatternBackend, counters: CounterBackend) -> Self {
        let allocator = AllocationService::new(
            PatternManager::with_formats(patterns, standard_formats()),
            counters,
        );
        Self { config, allocator }
    }

    /// State backed entirely by process memory. Nothing survives a restart.
    pub fn in_memory() -> Self {
        Self::new(
            AppConfig::in_memory(),
            PatternBackend::Memory(MemoryPatternStore::new()),
            CounterBackend::Memory(MemoryCounterStore::new()),
        )
    }

    /// Connect the configured backends, running migrations when enabled.
    pub async fn from_config(config: AppConfig) -> Result<Self, AppError> {
        let needs_database = config.pattern_backend == StorageBackend::Postgres
            || config.counter_backend == StorageBackend::Postgres;

        let pool = if needs_database {
            let url = config.database_url.as_deref().ok_or_else(|| {
                AppError::Internal("DATABASE_URL is required for the postgres backend".to_string())
            })?;
            let pool = db::create_pool(url, config.database_max_connections).await?;
            if config.run_migrations {
                db::run_migrations(&pool)
                    .await
                    .map_err(|e| AppError::Internal(format!("Migrations failed: {e}")))?;
                tracing::info!("Database migrations applied");
            }
            Some(pool)
        } else {
            None
        };

        let patterns = match (config.pattern_backend, &pool) {
            (StorageBackend::Postgres, Some(pool)) => {
                PatternBackend::Postgres(PgPatternStore::new(pool.clone()))
            }
            (StorageBackend::Memory, _) => PatternBackend::Memory(MemoryPatternStore::new()),
            (backend, _) => {
                return Err(AppError::Internal(format!(
                    "{backend:?} cannot store patterns"
                )))
            }
        };

        let counters = match (config.counter_backend, &pool) {
            (StorageBackend::Postgres, Some(pool)) => CounterBackend::Postgres(PgCounterStore::new(
                pool.clone(),
                config.counter_retry.clone(),
            )),
            (StorageBackend::Redis, _) => CounterBackend::Redis(
                RedisCounterStore::connect(&config.redis_url, config.counter_retry.clone()).await?,
            ),
            (StorageBackend::Memory, _) => CounterBackend::Memory(MemoryCounterStore::new()),
            (backend, _) => {
                return Err(AppError::Internal(format!(
                    "{backend:?} counter backend is unavailable"
                )))
            }
        };

        if counters.name() == "memory" && patterns.name() != "memory" {
            tracing::warn!(
                pattern_backend = patterns.name(),
                "Counters kept in memory; sequences restart after a process restart"
            );
        }

        tracing::info!(
            pattern_backend = patterns.name(),
            counter_backend = counters.name(),
            "Storage backends ready"
        );

        Ok(Self::new(config, patterns, counters))
    }

    pub fn patterns(&self) -> &Patterns {
        self.allocator.patterns()
    }
}
