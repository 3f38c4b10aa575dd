//! Product queries: titles, ordering, name resolution, entry state.

use rusqlite::{params, OptionalExtension};

use crate::pool::{DbPool, DbResult};
use crate::queries::{id_params, placeholders, sanitize_like};
use crate::tenant::Tenant;

/// A product id with its title.
#[derive(Debug, Clone)]
pub struct TitleRow {
    pub id: i64,
    pub title: String,
}

/// State of a website entry linked to an import record.
#[derive(Debug, Clone)]
pub struct EntryStateRow {
    pub id: i64,
    pub title: String,
    pub enabled: bool,
    pub customised: bool,
    pub type_id: Option<i64>,
    pub post_date: Option<String>,
    pub expiry_date: Option<String>,
    pub category_count: i64,
    pub image_count: i64,
}

/// Titles for a set of product ids (order unspecified; callers sort).
pub fn product_titles(pool: &DbPool, tenant: &Tenant, ids: &[i64]) -> DbResult<Vec<TitleRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT elementId, COALESCE(title, '') FROM {c} WHERE elementId IN ({ph})",
        c = tenant.table("craft_content"),
        ph = placeholders(ids.len()),
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(id_params(ids).iter()), |row| {
            Ok(TitleRow {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Ids ordered by next-event date, soonest first; products without a date
/// sink to the end; id ascending breaks ties.
pub fn order_by_event_date(pool: &DbPool, tenant: &Tenant, ids: &[i64]) -> DbResult<Vec<i64>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT elementId FROM {c}
         WHERE elementId IN ({ph})
         ORDER BY field_nextEvent IS NULL, field_nextEvent, elementId",
        c = tenant.table("craft_content"),
        ph = placeholders(ids.len()),
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(id_params(ids).iter()), |row| {
            row.get(0)
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Resolve product entries whose title contains the given name
/// (case-insensitive), enabled and live only, capped.
pub fn find_products_by_title(
    pool: &DbPool,
    tenant: &Tenant,
    name: &str,
    products_section_id: i64,
    cap: usize,
) -> DbResult<Vec<TitleRow>> {
    let needle = sanitize_like(name).to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT e.id, COALESCE(c.title, '')
         FROM {e} e
         JOIN {en} en ON en.id = e.id
         LEFT JOIN {c} c ON c.elementId = e.id
         WHERE en.sectionId = ?1
           AND e.enabled = 1 AND e.dateDeleted IS NULL
           AND LOWER(c.title) LIKE '%' || ?2 || '%'
         ORDER BY e.id
         LIMIT ?3",
        e = tenant.table("craft_elements"),
        en = tenant.table("craft_entries"),
        c = tenant.table("craft_content"),
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![products_section_id, needle, cap as i64], |row| {
            Ok(TitleRow {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// One row of entry state plus the two relation counts (categories,
/// images) the import trace reports.
pub fn entry_state(pool: &DbPool, tenant: &Tenant, entry_id: i64) -> DbResult<Option<EntryStateRow>> {
    let sql = format!(
        "SELECT e.id, COALESCE(c.title, ''), e.enabled,
                COALESCE(c.field_customised, 0), en.typeId, en.postDate, en.expiryDate,
                (SELECT COUNT(DISTINCT r.targetId)
                   FROM {r} r JOIN {cat} cat ON cat.id = r.targetId
                  WHERE r.sourceId = e.id),
                (SELECT COUNT(DISTINCT r.targetId)
                   FROM {r} r JOIN {e_inner} a ON a.id = r.targetId
                  WHERE r.sourceId = e.id AND a.type = 'asset')
         FROM {e_outer} e
         JOIN {en_t} en ON en.id = e.id
         LEFT JOIN {c} c ON c.elementId = e.id
         WHERE e.id = ?1",
        r = tenant.table("craft_relations"),
        cat = tenant.table("craft_categories"),
        c = tenant.table("craft_content"),
        e_inner = tenant.table("craft_elements"),
        e_outer = tenant.table("craft_elements"),
        en_t = tenant.table("craft_entries"),
    );
    pool.with_conn(|conn| {
        conn.query_row(&sql, params![entry_id], |row| {
            Ok(EntryStateRow {
                id: row.get(0)?,
                title: row.get(1)?,
                enabled: row.get(2)?,
                customised: row.get::<_, i64>(3)? != 0,
                type_id: row.get(4)?,
                post_date: row.get(5)?,
                expiry_date: row.get(6)?,
                category_count: row.get(7)?,
                image_count: row.get(8)?,
            })
        })
        .optional()
        .map_err(Into::into)
    })
}
