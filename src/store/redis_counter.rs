//! Redis counter store: seed-or-increment runs as one server-side Lua script.

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::identifier_type::IdentifierType;
use crate::store::retry::{self, RetryConfig};
use crate::store::CounterStore;

const INCREMENT_SCRIPT: &str = r#"
if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
    return tonumber(ARGV[1])
end
return redis.call('INCR', KEYS[1])
"#;

#[derive(Clone)]
pub struct RedisCounterStore {
    conn: MultiplexedConnection,
    script: Arc<redis::Script>,
    retry: RetryConfig,
}

impl RedisCounterStore {
    pub async fn connect(redis_url: &str, retry: RetryConfig) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            script: Arc::new(redis::Script::new(INCREMENT_SCRIPT)),
            retry,
        })
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Key holding the counter of one (organization, identifier type).
pub fn counter_key(organization_id: Uuid, identifier_type: IdentifierType) -> String {
    format!("idalloc:counter:{organization_id}:{identifier_type}")
}

impl CounterStore for RedisCounterStore {
    async fn atomic_increment(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        seed_if_absent: i64,
    ) -> Result<i64, AppError> {
        let key = counter_key(organization_id, identifier_type);
        let key = key.as_str();
        let script = self.script.as_ref();
        let conn = &self.conn;
        retry::with_retry(
            &self.retry,
            "redis counter increment",
            retry::is_transient_redis,
            || async move {
                let mut conn = conn.clone();
                let value: i64 = script
                    .key(key)
                    .arg(seed_if_absent)
                    .invoke_async(&mut conn)
                    .await?;
                Ok::<i64, redis::RedisError>(value)
            },
        )
        .await
    }

    async fn current(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Option<i64>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = redis::cmd("GET")
            .arg(counter_key(organization_id, identifier_type))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }
}
