//! Per-tenant schema cache: `schema:{tenant}`, one-hour TTL.

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{KvPool, KvResult};

/// TTL for schema entries, in seconds.
pub const SCHEMA_TTL_SECS: u64 = 3600;

fn key(tenant: &str) -> String {
    format!("schema:{tenant}")
}

/// Read the cached schema for a tenant, if any.
pub async fn get<T: DeserializeOwned>(pool: &KvPool, tenant: &str) -> KvResult<Option<T>> {
    let mut conn = pool.clone();
    let json: Option<String> = conn.get(key(tenant)).await?;
    match json {
        Some(j) => Ok(Some(serde_json::from_str(&j)?)),
        None => Ok(None),
    }
}

/// Write-through a freshly built schema.
pub async fn put<T: Serialize>(pool: &KvPool, tenant: &str, schema: &T) -> KvResult<()> {
    let mut conn = pool.clone();
    let json = serde_json::to_string(schema)?;
    conn.set_ex::<_, _, ()>(key(tenant), json, SCHEMA_TTL_SECS).await?;
    Ok(())
}

/// Drop a tenant's cached schema (the refresh surface).
pub async fn delete(pool: &KvPool, tenant: &str) -> KvResult<()> {
    let mut conn = pool.clone();
    conn.del::<_, ()>(key(tenant)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shape() {
        assert_eq!(key("visityarra"), "schema:visityarra");
    }
}
