//! Hostname → tenant origin lookup: `origin:{hostname}`, read-only.
//!
//! Values are written by provisioning in the shape `{tenant}.{rootDomain}`;
//! this layer returns the raw value and leaves validation to the caller.

use redis::AsyncCommands;

use crate::client::{KvPool, KvResult};

fn key(hostname: &str) -> String {
    format!("origin:{hostname}")
}

/// Read the origin record for a hostname, if provisioned.
pub async fn get(pool: &KvPool, hostname: &str) -> KvResult<Option<String>> {
    let mut conn = pool.clone();
    let value: Option<String> = conn.get(key(hostname)).await?;
    Ok(value)
}
