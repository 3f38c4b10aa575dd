//! Page and page-builder block resolution.

use std::collections::HashMap;

use rusqlite::types::ValueRef;
use rusqlite::{params, OptionalExtension};

use crate::pool::{DbPool, DbResult};
use crate::tenant::Tenant;

/// Columns of a matrix-content row that carry no author-visible value.
const INTERNAL_COLUMNS: &[&str] = &["id", "elementId", "siteId", "dateCreated", "dateUpdated", "uid"];

/// A resolved page.
#[derive(Debug, Clone)]
pub struct PageRow {
    pub id: i64,
    pub uri: String,
    pub title: Option<String>,
}

/// A page-builder block, before field values and relations are attached.
#[derive(Debug, Clone)]
pub struct BlockRow {
    pub id: i64,
    pub block_type: String,
    pub sort_order: i64,
}

/// The uri spellings tried when resolving a page, in order.
///
/// `""` and `"/"` are the homepage, stored as `__home__`.
pub fn uri_candidates(uri: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut push = |c: String| {
        if !candidates.contains(&c) {
            candidates.push(c);
        }
    };

    push(uri.to_string());
    if uri.is_empty() || uri == "/" {
        push("__home__".to_string());
    }
    if let Some(stripped) = uri.strip_prefix('/') {
        push(stripped.to_string());
    }
    if !uri.starts_with('/') {
        push(format!("/{uri}"));
    }
    candidates
}

/// Resolve a page by uri: first enabled, live (not deleted, not a
/// revision, not a draft) match across the candidate spellings wins.
pub fn find_page(pool: &DbPool, tenant: &Tenant, uri: &str) -> DbResult<Option<PageRow>> {
    let sql = format!(
        "SELECT e.id, es.uri, c.title
         FROM {e} e
         JOIN {es} es ON es.elementId = e.id
         LEFT JOIN {c} c ON c.elementId = e.id
         WHERE es.uri = ?1
           AND e.enabled = 1 AND es.enabled = 1
           AND e.dateDeleted IS NULL
           AND e.revisionId IS NULL
           AND e.draftId IS NULL
         LIMIT 1",
        e = tenant.table("craft_elements"),
        es = tenant.table("craft_elements_sites"),
        c = tenant.table("craft_content"),
    );

    for candidate in uri_candidates(uri) {
        let found = pool.with_conn(|conn| {
            conn.query_row(&sql, params![candidate], |row| {
                Ok(PageRow {
                    id: row.get(0)?,
                    uri: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    title: row.get(2)?,
                })
            })
            .optional()
            .map_err(Into::into)
        })?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

/// Blocks on a page, optionally restricted to one block-type handle,
/// ordered by author sort order.
pub fn page_blocks(
    pool: &DbPool,
    tenant: &Tenant,
    page_id: i64,
    block_type: Option<&str>,
) -> DbResult<Vec<BlockRow>> {
    let filter = if block_type.is_some() {
        "AND bt.handle = ?2"
    } else {
        ""
    };
    let sql = format!(
        "SELECT mb.id, bt.handle, mb.sortOrder
         FROM {mb} mb
         JOIN {bt} bt ON bt.id = mb.typeId
         JOIN {e} e ON e.id = mb.id
         WHERE mb.ownerId = ?1
           AND e.enabled = 1 AND e.dateDeleted IS NULL
           {filter}
         ORDER BY mb.sortOrder",
        mb = tenant.table("craft_matrixblocks"),
        bt = tenant.table("craft_matrixblocktypes"),
        e = tenant.table("craft_elements"),
    );

    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(BlockRow {
                id: row.get(0)?,
                block_type: row.get(1)?,
                sort_order: row.get(2)?,
            })
        };
        let rows = match block_type {
            Some(handle) => stmt.query_map(params![page_id, handle], map_row)?,
            None => stmt.query_map(params![page_id], map_row)?,
        };
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Field values of one block from the matrix-content table.
///
/// The table name is synthesized from the page-builder handle, so it goes
/// through the matrix-content gate before it reaches the statement. Column
/// names are mapped back to field handles by stripping the `field_` prefix
/// and, when present, the block-type prefix.
pub fn block_field_values(
    pool: &DbPool,
    tenant: &Tenant,
    matrix_table: &str,
    block_id: i64,
    block_type_handle: &str,
) -> DbResult<HashMap<String, serde_json::Value>> {
    let table = tenant.matrix_content_table(matrix_table)?;
    let sql = format!("SELECT * FROM {table} WHERE elementId = ?1 LIMIT 1");

    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let mut rows = stmt.query(params![block_id])?;
        let mut values = HashMap::new();
        if let Some(row) = rows.next()? {
            for (idx, name) in names.iter().enumerate() {
                if INTERNAL_COLUMNS.contains(&name.as_str()) {
                    continue;
                }
                let key = field_value_key(name, block_type_handle);
                values.insert(key, column_to_json(row.get_ref(idx)?));
            }
        }
        Ok(values)
    })
}

/// Map a matrix-content column name to its field handle.
fn field_value_key(column: &str, block_type_handle: &str) -> String {
    let rest = column.strip_prefix("field_").unwrap_or(column);
    let type_prefix = format!("{block_type_handle}_");
    rest.strip_prefix(&type_prefix).unwrap_or(rest).to_string()
}

fn column_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Value::from(f),
        ValueRef::Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => serde_json::Value::Null,
    }
}
