//! Per-tenant schema cache: well-known handles resolved to the numeric
//! ids and derived table names this tenant uses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use explain_db::queries::schema as schema_queries;
use explain_db::{DbPool, Tenant};
use explain_redis::{schema_cache, KvPool};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ExplainError, ExplainResult};
use crate::handles;

/// How long a schema entry stays fresh. Mirrors the KV TTL; the
/// `cachedAt` check guards against a stale store that never expires keys.
pub const SCHEMA_TTL_SECS: i64 = schema_cache::SCHEMA_TTL_SECS as i64;

/// Resolved identifiers for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCache {
    /// Field handle → field id. Component-config fields keep their bare
    /// handle; global fields are keyed `global:{handle}`.
    pub fields: HashMap<String, i64>,
    /// Section handle → section id.
    pub sections: HashMap<String, i64>,
    /// Derived matrix-content table name.
    pub matrix_content_table: String,
    pub cached_at: DateTime<Utc>,
}

impl SchemaCache {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.cached_at).num_seconds() < SCHEMA_TTL_SECS
    }

    pub fn field(&self, handle: &str) -> Option<i64> {
        self.fields.get(handle).copied()
    }

    pub fn global_field(&self, handle: &str) -> Option<i64> {
        self.fields.get(&format!("global:{handle}")).copied()
    }

    pub fn section(&self, handle: &str) -> Option<i64> {
        self.sections.get(handle).copied()
    }
}

/// Get the tenant's schema: cached if fresh, rebuilt and written through
/// otherwise. A broken cache read degrades to a rebuild.
pub async fn get_schema(db: &DbPool, kv: &KvPool, tenant: &Tenant) -> ExplainResult<SchemaCache> {
    match schema_cache::get::<SchemaCache>(kv, tenant.as_str()).await {
        Ok(Some(cached)) if cached.is_fresh(Utc::now()) => {
            debug!(tenant = %tenant, "Schema cache hit");
            return Ok(cached);
        }
        Ok(_) => {}
        Err(e) => warn!(tenant = %tenant, error = %e, "Schema cache read failed"),
    }

    let schema = build_schema(db, tenant)?;
    if let Err(e) = schema_cache::put(kv, tenant.as_str(), &schema).await {
        warn!(tenant = %tenant, error = %e, "Schema cache write failed");
    }
    Ok(schema)
}

/// Drop the cached schema so the next request rebuilds it.
pub async fn refresh_schema(kv: &KvPool, tenant: &Tenant) -> ExplainResult<()> {
    schema_cache::delete(kv, tenant.as_str()).await?;
    Ok(())
}

/// Rebuild the schema from the tenant's store.
pub fn build_schema(db: &DbPool, tenant: &Tenant) -> ExplainResult<SchemaCache> {
    let mut fields = HashMap::new();

    // Component-config fields live in the block-type context of the
    // products block inside the page builder.
    let uid = schema_queries::component_block_type_uid(
        db,
        tenant,
        handles::PAGE_BUILDER_FIELD,
        handles::PRODUCTS_BLOCK_TYPE,
    )?;
    if let Some(uid) = &uid {
        let context = format!("matrixBlockType:{uid}");
        for row in schema_queries::fields_in_context(db, tenant, &context)? {
            fields.insert(row.handle, row.id);
        }
    }

    for row in schema_queries::global_fields(db, tenant, handles::GLOBAL_FIELD_HANDLES)? {
        fields.insert(format!("global:{}", row.handle), row.id);
    }

    let sections: HashMap<String, i64> = schema_queries::sections(db, tenant, handles::SECTION_HANDLES)?
        .into_iter()
        .collect();

    // Without the page-builder field the matrix-content table cannot be
    // derived and nothing downstream can run.
    if !fields.contains_key(&format!("global:{}", handles::PAGE_BUILDER_FIELD)) {
        return Err(ExplainError::SchemaIncomplete(format!(
            "tenant {} has no {} field",
            tenant,
            handles::PAGE_BUILDER_FIELD
        )));
    }

    let matrix_content_table = format!(
        "craft_matrixcontent_{}",
        handles::PAGE_BUILDER_FIELD.to_lowercase()
    );

    Ok(SchemaCache {
        fields,
        sections,
        matrix_content_table,
        cached_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use explain_db::testing::TenantFixture;

    #[test]
    fn builds_schema_from_fixture() {
        let fx = TenantFixture::new("t1");
        let schema = build_schema(&fx.pool, &fx.tenant).unwrap();

        assert_eq!(schema.matrix_content_table, "craft_matrixcontent_pagebuilder");
        assert!(schema.field("includeCategories").is_some());
        assert!(schema.field("excludeProducts").is_some());
        assert!(schema.global_field("pageBuilder").is_some());
        assert!(schema.global_field("roam_products_locations").is_some());
        assert_eq!(schema.section("products"), Some(1));
        assert_eq!(schema.section("homepage"), Some(3));
    }

    #[test]
    fn derived_table_name_passes_the_gate() {
        let fx = TenantFixture::new("t1");
        let schema = build_schema(&fx.pool, &fx.tenant).unwrap();
        assert!(explain_db::tenant::is_safe_matrix_content_table(
            &schema.matrix_content_table
        ));
    }

    #[test]
    fn missing_page_builder_is_incomplete() {
        let fx = TenantFixture::new("t1");
        fx.exec(
            "DELETE FROM {t}.craft_fields WHERE handle = 'pageBuilder'",
            [],
        );
        let err = build_schema(&fx.pool, &fx.tenant).unwrap_err();
        assert!(matches!(err, ExplainError::SchemaIncomplete(_)));
    }

    #[test]
    fn freshness_window() {
        let fx = TenantFixture::new("t1");
        let mut schema = build_schema(&fx.pool, &fx.tenant).unwrap();
        let now = Utc::now();
        assert!(schema.is_fresh(now));

        schema.cached_at = now - Duration::seconds(SCHEMA_TTL_SECS + 1);
        assert!(!schema.is_fresh(now));
    }
}
