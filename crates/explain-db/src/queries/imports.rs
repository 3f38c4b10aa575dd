//! ATDW import-record queries.

use rusqlite::{params, OptionalExtension, Row};

use crate::pool::{DbPool, DbResult};
use crate::queries::sanitize_like;
use crate::tenant::Tenant;

/// Cap on name-based record lookups.
const NAME_LOOKUP_CAP: i64 = 10;

/// One import record as stored by the ATDW sync.
#[derive(Debug, Clone)]
pub struct AtdwRecordRow {
    pub id: i64,
    pub product_id: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub imported: bool,
    pub entry_id: Option<i64>,
    pub reason: Option<String>,
    pub payload: Option<String>,
    pub date_updated: Option<String>,
}

/// Table-level statistics reported when a lookup misses.
#[derive(Debug, Clone, Copy)]
pub struct ImportStats {
    pub total: i64,
    pub imported: i64,
    pub categories: i64,
}

const RECORD_COLUMNS: &str = "id, productId, productName, category, status, imported, \
                              entryId, reason, payload, dateUpdated";

fn map_record(row: &Row<'_>) -> rusqlite::Result<AtdwRecordRow> {
    Ok(AtdwRecordRow {
        id: row.get(0)?,
        product_id: row.get(1)?,
        product_name: row.get(2)?,
        category: row.get(3)?,
        status: row.get(4)?,
        imported: row.get::<_, i64>(5)? != 0,
        entry_id: row.get(6)?,
        reason: row.get(7)?,
        payload: row.get(8)?,
        date_updated: row.get(9)?,
    })
}

/// Exact lookup by ATDW product id.
pub fn record_by_product_id(
    pool: &DbPool,
    tenant: &Tenant,
    product_id: &str,
) -> DbResult<Option<AtdwRecordRow>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM {t}
         WHERE productId = ?1
         ORDER BY dateUpdated DESC
         LIMIT 1",
        t = tenant.table("craft_atdw_products"),
    );
    pool.with_conn(|conn| {
        conn.query_row(&sql, params![product_id], map_record)
            .optional()
            .map_err(Into::into)
    })
}

/// Name lookup, two stages: a tight match on the payload's title field
/// first, then a broad substring match. Input is sanitized before it can
/// reach a LIKE pattern. Most recently updated first, capped.
pub fn records_by_name(pool: &DbPool, tenant: &Tenant, name: &str) -> DbResult<Vec<AtdwRecordRow>> {
    let clean = sanitize_like(name);
    if clean.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tight = format!(
        "SELECT {RECORD_COLUMNS} FROM {t}
         WHERE payload LIKE '%\"title\":\"' || ?1 || '%'
         ORDER BY dateUpdated DESC
         LIMIT {NAME_LOOKUP_CAP}",
        t = tenant.table("craft_atdw_products"),
    );
    let broad = format!(
        "SELECT {RECORD_COLUMNS} FROM {t}
         WHERE payload LIKE '%' || ?1 || '%' OR productName LIKE '%' || ?1 || '%'
         ORDER BY dateUpdated DESC
         LIMIT {NAME_LOOKUP_CAP}",
        t = tenant.table("craft_atdw_products"),
    );

    let run = |sql: &str| -> DbResult<Vec<AtdwRecordRow>> {
        pool.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params![clean], map_record)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    };

    let hits = run(&tight)?;
    if !hits.is_empty() {
        return Ok(hits);
    }
    run(&broad)
}

/// Whole-table statistics.
pub fn table_stats(pool: &DbPool, tenant: &Tenant) -> DbResult<ImportStats> {
    let sql = format!(
        "SELECT COUNT(*),
                COALESCE(SUM(imported), 0),
                COUNT(DISTINCT category)
         FROM {t}",
        t = tenant.table("craft_atdw_products"),
    );
    pool.with_conn(|conn| {
        conn.query_row(&sql, [], |row| {
            Ok(ImportStats {
                total: row.get(0)?,
                imported: row.get(1)?,
                categories: row.get(2)?,
            })
        })
        .map_err(Into::into)
    })
}
