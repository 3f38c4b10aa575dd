//! Relation harvesting and relation-dimension queries.

use std::collections::{BTreeMap, HashSet};

use rusqlite::params;
use rusqlite::types::Value as SqlValue;

use crate::pool::{DbPool, DbResult};
use crate::queries::{id_params, placeholders};
use crate::tenant::Tenant;

/// A related element with its display title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedItem {
    pub id: i64,
    pub title: String,
}

/// All relations of a block, keyed by field handle, in author order,
/// deduplicated per handle.
pub fn block_relations(
    pool: &DbPool,
    tenant: &Tenant,
    block_id: i64,
) -> DbResult<BTreeMap<String, Vec<RelatedItem>>> {
    let sql = format!(
        "SELECT f.handle, r.targetId, COALESCE(c.title, '')
         FROM {r} r
         JOIN {f} f ON f.id = r.fieldId
         LEFT JOIN {c} c ON c.elementId = r.targetId
         WHERE r.sourceId = ?1
         ORDER BY f.handle, r.sortOrder, r.id",
        r = tenant.table("craft_relations"),
        f = tenant.table("craft_fields"),
        c = tenant.table("craft_content"),
    );

    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![block_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                RelatedItem {
                    id: row.get(1)?,
                    title: row.get(2)?,
                },
            ))
        })?;

        let mut by_handle: BTreeMap<String, Vec<RelatedItem>> = BTreeMap::new();
        let mut seen: HashSet<(String, i64)> = HashSet::new();
        for row in rows {
            let (handle, item) = row?;
            if seen.insert((handle.clone(), item.id)) {
                by_handle.entry(handle).or_default().push(item);
            }
        }
        Ok(by_handle)
    })
}

/// Enabled, live products related to at least one of the target ids.
///
/// One relation dimension of the multi-dimensional AND; also the direct
/// branch of region→product expansion.
pub fn products_related_to_any(
    pool: &DbPool,
    tenant: &Tenant,
    target_ids: &[i64],
    products_section_id: i64,
) -> DbResult<Vec<i64>> {
    if target_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT DISTINCT r.sourceId
         FROM {r} r
         JOIN {en} en ON en.id = r.sourceId
         JOIN {e} e ON e.id = r.sourceId
         WHERE r.targetId IN ({ph})
           AND en.sectionId = ?{section}
           AND e.enabled = 1 AND e.dateDeleted IS NULL
         ORDER BY r.sourceId",
        r = tenant.table("craft_relations"),
        en = tenant.table("craft_entries"),
        e = tenant.table("craft_elements"),
        ph = placeholders(target_ids.len()),
        section = target_ids.len() + 1,
    );

    let mut bind = id_params(target_ids);
    bind.push(SqlValue::Integer(products_section_id));

    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bind.iter()), |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Intersection across relation dimensions: products that relate to at
/// least one id in every supplied non-empty dimension. Empty input yields
/// the empty set.
pub fn intersect_relation_dimensions(
    pool: &DbPool,
    tenant: &Tenant,
    dimensions: &[&[i64]],
    products_section_id: i64,
) -> DbResult<Vec<i64>> {
    let active: Vec<&&[i64]> = dimensions.iter().filter(|d| !d.is_empty()).collect();
    if active.is_empty() {
        return Ok(Vec::new());
    }

    let mut result: Option<Vec<i64>> = None;
    for dimension in active {
        let set = products_related_to_any(pool, tenant, dimension, products_section_id)?;
        result = Some(match result {
            None => set,
            Some(prev) => {
                let keep: HashSet<i64> = set.into_iter().collect();
                prev.into_iter().filter(|id| keep.contains(id)).collect()
            }
        });
        if result.as_ref().is_some_and(|r| r.is_empty()) {
            break;
        }
    }
    Ok(result.unwrap_or_default())
}
