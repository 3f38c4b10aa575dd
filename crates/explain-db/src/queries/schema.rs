//! Schema-discovery queries: field ids, section ids, block-type uids.

use rusqlite::{params, OptionalExtension};

use crate::pool::{DbPool, DbResult};
use crate::queries::placeholders;
use crate::tenant::Tenant;

/// A field row: numeric id plus handle.
#[derive(Debug, Clone)]
pub struct FieldRow {
    pub id: i64,
    pub handle: String,
}

/// Uid of the component block type that belongs to the page-builder
/// matrix field. This context holds the component-config fields.
pub fn component_block_type_uid(
    pool: &DbPool,
    tenant: &Tenant,
    page_builder_handle: &str,
    block_type_handle: &str,
) -> DbResult<Option<String>> {
    let sql = format!(
        "SELECT bt.uid
         FROM {bt} bt
         JOIN {f} f ON f.id = bt.fieldId
         WHERE f.handle = ?1 AND bt.handle = ?2
         LIMIT 1",
        bt = tenant.table("craft_matrixblocktypes"),
        f = tenant.table("craft_fields"),
    );
    pool.with_conn(|conn| {
        conn.query_row(&sql, params![page_builder_handle, block_type_handle], |row| {
            row.get(0)
        })
        .optional()
        .map_err(Into::into)
    })
}

/// All fields whose context matches (e.g. `matrixBlockType:{uid}`).
pub fn fields_in_context(pool: &DbPool, tenant: &Tenant, context: &str) -> DbResult<Vec<FieldRow>> {
    let sql = format!(
        "SELECT id, handle FROM {f} WHERE context = ?1 ORDER BY id",
        f = tenant.table("craft_fields"),
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![context], |row| {
            Ok(FieldRow {
                id: row.get(0)?,
                handle: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Global-context fields restricted to a handle list.
pub fn global_fields(pool: &DbPool, tenant: &Tenant, handles: &[&str]) -> DbResult<Vec<FieldRow>> {
    if handles.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, handle FROM {f}
         WHERE context = 'global' AND handle IN ({ph})
         ORDER BY id",
        f = tenant.table("craft_fields"),
        ph = placeholders(handles.len()),
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(handles.iter()), |row| {
            Ok(FieldRow {
                id: row.get(0)?,
                handle: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Section ids for a handle list, as `(handle, id)` pairs.
pub fn sections(pool: &DbPool, tenant: &Tenant, handles: &[&str]) -> DbResult<Vec<(String, i64)>> {
    if handles.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT handle, id FROM {s} WHERE handle IN ({ph}) ORDER BY id",
        s = tenant.table("craft_sections"),
        ph = placeholders(handles.len()),
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(handles.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TenantFixture, FIELD_INCLUDE_CATEGORIES, PRODUCTS_BLOCK_TYPE_UID};

    #[test]
    fn finds_component_block_type_uid() {
        let fx = TenantFixture::new("t1");
        let uid = component_block_type_uid(&fx.pool, &fx.tenant, "pageBuilder", "products")
            .unwrap()
            .unwrap();
        assert_eq!(uid, PRODUCTS_BLOCK_TYPE_UID);

        let missing =
            component_block_type_uid(&fx.pool, &fx.tenant, "pageBuilder", "gallery").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn loads_block_type_context_fields() {
        let fx = TenantFixture::new("t1");
        let ctx = format!("matrixBlockType:{PRODUCTS_BLOCK_TYPE_UID}");
        let fields = fields_in_context(&fx.pool, &fx.tenant, &ctx).unwrap();
        assert_eq!(fields.len(), 7);
        assert!(fields
            .iter()
            .any(|f| f.handle == "includeCategories" && f.id == FIELD_INCLUDE_CATEGORIES));
    }

    #[test]
    fn loads_global_fields_and_sections() {
        let fx = TenantFixture::new("t1");
        let fields =
            global_fields(&fx.pool, &fx.tenant, &["pageBuilder", "description", "nope"]).unwrap();
        assert_eq!(fields.len(), 2);

        let secs = sections(&fx.pool, &fx.tenant, &["products", "pages", "homepage"]).unwrap();
        assert_eq!(secs.len(), 3);
        assert_eq!(secs[0], ("products".to_string(), 1));
    }
}
