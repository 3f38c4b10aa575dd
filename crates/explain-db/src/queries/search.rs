//! Content-search-index queries.

use std::collections::HashSet;

use rusqlite::params;

use crate::pool::{DbPool, DbResult};
use crate::queries::sanitize_like;
use crate::tenant::Tenant;

/// Products whose indexed locations text contains any of the postcodes.
///
/// Keywords in the search index are space-padded, so an exact-token match
/// is `LIKE '% {postcode} %'`. Union across postcodes, deduplicated,
/// first-seen order.
pub fn products_by_postcodes(
    pool: &DbPool,
    tenant: &Tenant,
    postcodes: &[String],
    locations_field_id: i64,
) -> DbResult<Vec<i64>> {
    if postcodes.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT DISTINCT si.elementId
         FROM {si} si
         JOIN {e} e ON e.id = si.elementId
         WHERE si.fieldId = ?1
           AND e.enabled = 1 AND e.dateDeleted IS NULL
           AND si.keywords LIKE '% ' || ?2 || ' %'
         ORDER BY si.elementId",
        si = tenant.table("craft_searchindex"),
        e = tenant.table("craft_elements"),
    );

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for postcode in postcodes {
        let needle = sanitize_like(postcode);
        if needle.is_empty() {
            continue;
        }
        let ids: Vec<i64> = pool.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![locations_field_id, needle], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })?;
        for id in ids {
            if seen.insert(id) {
                out.push(id);
            }
        }
    }
    Ok(out)
}
