//! Redis connection management.

use redis::aio::ConnectionManager;
use thiserror::Error;

/// KV error types.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for KV operations.
pub type KvResult<T> = Result<T, KvError>;

/// KV connection pool. `ConnectionManager` multiplexes internally and is
/// `Clone`, so callers clone it per operation.
pub type KvPool = ConnectionManager;

/// Initialize a KV pool from a URL such as `redis://127.0.0.1:6379`.
pub async fn init_pool(redis_url: &str) -> KvResult<KvPool> {
    let client = redis::Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(manager)
}
