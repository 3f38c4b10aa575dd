//! Schema cache maintenance.

use anyhow::{Context, Result};
use explain_db::Tenant;

pub async fn refresh(tenant: &str, redis_url: &str) -> Result<()> {
    let tenant = Tenant::parse(tenant).context("invalid tenant identifier")?;
    let kv = explain_redis::init_pool(redis_url).await?;
    explain_core::schema::refresh_schema(&kv, &tenant)
        .await
        .context("failed to drop the schema cache")?;

    println!("Schema cache dropped for tenant {tenant}");
    Ok(())
}
