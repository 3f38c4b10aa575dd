//! Per-request trace cache: `trace:{tenant}:{pageUri}:{componentType}:{blockIndex}`,
//! five-minute TTL. A hit skips the filter chain entirely.

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{KvPool, KvResult};

/// TTL for trace entries, in seconds.
pub const TRACE_TTL_SECS: u64 = 300;

/// The request fingerprint a cached trace is keyed by.
pub fn key(tenant: &str, page_uri: &str, component_type: &str, block_index: usize) -> String {
    format!("trace:{tenant}:{page_uri}:{component_type}:{block_index}")
}

/// Read a cached `{config, trace}` snapshot.
pub async fn get<T: DeserializeOwned>(pool: &KvPool, cache_key: &str) -> KvResult<Option<T>> {
    let mut conn = pool.clone();
    let json: Option<String> = conn.get(cache_key).await?;
    match json {
        Some(j) => Ok(Some(serde_json::from_str(&j)?)),
        None => Ok(None),
    }
}

/// Store a `{config, trace}` snapshot.
pub async fn put<T: Serialize>(pool: &KvPool, cache_key: &str, value: &T) -> KvResult<()> {
    let mut conn = pool.clone();
    let json = serde_json::to_string(value)?;
    conn.set_ex::<_, _, ()>(cache_key, json, TRACE_TTL_SECS).await?;
    Ok(())
}
