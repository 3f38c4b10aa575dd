//! Category queries: nested-set ancestor stripping, region postcodes,
//! ATDW category mapping.

use std::collections::HashSet;

use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::pool::{DbPool, DbResult};
use crate::queries::relations::RelatedItem;
use crate::queries::{id_params, placeholders};
use crate::tenant::Tenant;

/// One row of the region postcode table field.
#[derive(Debug, Deserialize)]
struct PostcodeRow {
    #[serde(default)]
    #[allow(dead_code)]
    col1: Option<String>,
    #[serde(default)]
    col2: Option<String>,
}

/// A region category with its configured postcodes.
#[derive(Debug, Clone)]
pub struct RegionCategoryRow {
    pub id: i64,
    pub title: String,
    pub postcodes: Vec<String>,
}

/// Drop every member of `ids` that has a descendant also in `ids`.
///
/// Nested-set self-join: a parent strictly contains a child when
/// `parent.lft < child.lft` and `parent.rgt > child.rgt` within one
/// structure. The survivors are the deepest selected nodes, so a selection
/// of "Accommodation" plus "Accommodation > Cabins" filters by Cabins only.
pub fn strip_ancestors(pool: &DbPool, tenant: &Tenant, ids: &[i64]) -> DbResult<Vec<i64>> {
    if ids.len() < 2 {
        return Ok(ids.to_vec());
    }
    let ph = placeholders(ids.len());
    let ph2 = (ids.len() + 1..=ids.len() * 2)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT DISTINCT parent.elementId
         FROM {s} parent
         JOIN {s} child
           ON parent.structureId = child.structureId
          AND parent.lft < child.lft
          AND parent.rgt > child.rgt
         WHERE parent.elementId IN ({ph})
           AND child.elementId IN ({ph2})
           AND parent.elementId <> child.elementId",
        s = tenant.table("craft_structureelements"),
    );

    let mut bind = id_params(ids);
    bind.extend(id_params(ids));

    let ancestors: HashSet<i64> = pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bind.iter()), |row| row.get(0))?;
        rows.collect::<Result<HashSet<_>, _>>().map_err(Into::into)
    })?;

    Ok(ids
        .iter()
        .copied()
        .filter(|id| !ancestors.contains(id))
        .collect())
}

/// Postcodes configured on the given region categories, in region order,
/// trimmed, deduplicated, empties dropped.
pub fn region_postcodes(pool: &DbPool, tenant: &Tenant, region_ids: &[i64]) -> DbResult<Vec<String>> {
    if region_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT elementId, field_roam_categories_regionPostcodes
         FROM {c}
         WHERE elementId IN ({ph})",
        c = tenant.table("craft_content"),
        ph = placeholders(region_ids.len()),
    );

    let raw: Vec<(i64, Option<String>)> = pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(id_params(region_ids).iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })?;

    // preserve the caller's region order, not row order
    let mut postcodes = Vec::new();
    let mut seen = HashSet::new();
    for region_id in region_ids {
        for (_, json) in raw.iter().filter(|(id, _)| id == region_id) {
            for pc in parse_postcode_field(json.as_deref()) {
                if seen.insert(pc.clone()) {
                    postcodes.push(pc);
                }
            }
        }
    }
    Ok(postcodes)
}

/// Parse the JSON table field: an array of `{col1, col2}` rows where
/// `col2` is the postcode. Unparseable payloads yield nothing.
pub fn parse_postcode_field(json: Option<&str>) -> Vec<String> {
    let Some(json) = json else {
        return Vec::new();
    };
    let rows: Vec<PostcodeRow> = match serde_json::from_str(json) {
        Ok(rows) => rows,
        Err(_) => return Vec::new(),
    };
    rows.into_iter()
        .filter_map(|r| r.col2)
        .map(|pc| pc.trim().to_string())
        .filter(|pc| !pc.is_empty())
        .collect()
}

/// Enabled region categories with their postcode sets, in id order.
pub fn enabled_region_categories(pool: &DbPool, tenant: &Tenant) -> DbResult<Vec<RegionCategoryRow>> {
    let sql = format!(
        "SELECT cat.id, COALESCE(c.title, ''), c.field_roam_categories_regionPostcodes
         FROM {cat} cat
         JOIN {g} g ON g.id = cat.groupId
         JOIN {e} e ON e.id = cat.id
         LEFT JOIN {c} c ON c.elementId = cat.id
         WHERE g.handle = 'regions'
           AND e.enabled = 1 AND e.dateDeleted IS NULL
         ORDER BY cat.id",
        cat = tenant.table("craft_categories"),
        g = tenant.table("craft_categorygroups"),
        e = tenant.table("craft_elements"),
        c = tenant.table("craft_content"),
    );

    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        rows.map(|row| {
            let (id, title, json) = row?;
            Ok(RegionCategoryRow {
                id,
                title,
                postcodes: parse_postcode_field(json.as_deref()),
            })
        })
        .collect()
    })
}

/// The ATDW mapping category whose slug matches a lower-cased ATDW
/// type or classification.
pub fn mapping_category_by_slug(
    pool: &DbPool,
    tenant: &Tenant,
    slug: &str,
) -> DbResult<Option<RelatedItem>> {
    let sql = format!(
        "SELECT cat.id, COALESCE(c.title, '')
         FROM {cat} cat
         JOIN {g} g ON g.id = cat.groupId
         JOIN {es} es ON es.elementId = cat.id
         LEFT JOIN {c} c ON c.elementId = cat.id
         WHERE g.handle = 'atdwCategoryMapping' AND es.slug = ?1
         LIMIT 1",
        cat = tenant.table("craft_categories"),
        g = tenant.table("craft_categorygroups"),
        es = tenant.table("craft_elements_sites"),
        c = tenant.table("craft_content"),
    );
    pool.with_conn(|conn| {
        conn.query_row(&sql, params![slug], |row| {
            Ok(RelatedItem {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })
        .optional()
        .map_err(Into::into)
    })
}

/// Categories related *from* a source element (mapping category → product
/// categories, or entry → assigned categories), in relation order.
pub fn related_categories(pool: &DbPool, tenant: &Tenant, source_id: i64) -> DbResult<Vec<RelatedItem>> {
    let sql = format!(
        "SELECT r.targetId, COALESCE(c.title, '')
         FROM {r} r
         JOIN {cat} cat ON cat.id = r.targetId
         LEFT JOIN {c} c ON c.elementId = r.targetId
         WHERE r.sourceId = ?1
         ORDER BY r.sortOrder, r.id",
        r = tenant.table("craft_relations"),
        cat = tenant.table("craft_categories"),
        c = tenant.table("craft_content"),
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![source_id], |row| {
            Ok(RelatedItem {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for row in rows {
            let item = row?;
            if seen.insert(item.id) {
                items.push(item);
            }
        }
        Ok(items)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TenantFixture, FIELD_INCLUDE_CATEGORIES, GROUP_ATDW_MAPPING, GROUP_CATEGORIES, GROUP_REGIONS};

    fn tree_fixture() -> TenantFixture {
        let fx = TenantFixture::new("t1");
        // structure 1:  root(300) [1,10] > mid(301) [2,7] > leaf(302) [3,4]
        //               sibling leaf(303) [5,6]; unrelated(304) [8,9]
        for (id, slug) in [(300, "root"), (301, "mid"), (302, "leaf"), (303, "leaf2"), (304, "other")] {
            fx.category(id, GROUP_CATEGORIES, slug, slug);
        }
        fx.structure(1, 300, 1, 10);
        fx.structure(1, 301, 2, 7);
        fx.structure(1, 302, 3, 4);
        fx.structure(1, 303, 5, 6);
        fx.structure(1, 304, 8, 9);
        fx
    }

    #[test]
    fn strips_ancestors_keeps_deepest() {
        let fx = tree_fixture();
        let out = strip_ancestors(&fx.pool, &fx.tenant, &[300, 301, 302]).unwrap();
        assert_eq!(out, vec![302]);

        let out = strip_ancestors(&fx.pool, &fx.tenant, &[300, 302, 303]).unwrap();
        assert_eq!(out, vec![302, 303]);
    }

    #[test]
    fn unrelated_nodes_survive() {
        let fx = tree_fixture();
        let out = strip_ancestors(&fx.pool, &fx.tenant, &[302, 304]).unwrap();
        assert_eq!(out, vec![302, 304]);
        // singleton and empty pass through untouched
        assert_eq!(strip_ancestors(&fx.pool, &fx.tenant, &[300]).unwrap(), vec![300]);
        assert!(strip_ancestors(&fx.pool, &fx.tenant, &[]).unwrap().is_empty());
    }

    #[test]
    fn no_survivor_is_ancestor_of_another() {
        let fx = tree_fixture();
        let out = strip_ancestors(&fx.pool, &fx.tenant, &[300, 301, 302, 303, 304]).unwrap();
        assert_eq!(out, vec![302, 303, 304]);
    }

    #[test]
    fn postcode_field_parsing() {
        let json = r#"[{"col1":"row1","col2":" 3777 "},{"col1":"row2","col2":""},{"col1":"row3","col2":"3775"}]"#;
        assert_eq!(parse_postcode_field(Some(json)), vec!["3777", "3775"]);
        assert!(parse_postcode_field(Some("not json")).is_empty());
        assert!(parse_postcode_field(None).is_empty());
    }

    #[test]
    fn region_postcodes_dedupe_across_regions() {
        let fx = TenantFixture::new("t1");
        fx.category(310, GROUP_REGIONS, "valley", "Valley");
        fx.category(311, GROUP_REGIONS, "ranges", "Ranges");
        fx.region_postcodes(310, &["3777", "3775"]);
        fx.region_postcodes(311, &["3775", "3799"]);

        let pcs = region_postcodes(&fx.pool, &fx.tenant, &[310, 311]).unwrap();
        assert_eq!(pcs, vec!["3777", "3775", "3799"]);
    }

    #[test]
    fn region_config_lists_enabled_only() {
        let fx = TenantFixture::new("t1");
        fx.category(310, GROUP_REGIONS, "valley", "Valley");
        fx.category(311, GROUP_REGIONS, "ranges", "Ranges");
        fx.region_postcodes(310, &["3777"]);
        fx.exec("UPDATE {t}.craft_elements SET enabled = 0 WHERE id = 311", []);

        let regions = enabled_region_categories(&fx.pool, &fx.tenant).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].title, "Valley");
        assert_eq!(regions[0].postcodes, vec!["3777"]);
    }

    #[test]
    fn mapping_lookup_and_related_categories() {
        let fx = TenantFixture::new("t1");
        fx.category(350, GROUP_ATDW_MAPPING, "accomm", "Accommodation Mapping");
        fx.category(300, GROUP_CATEGORIES, "cabins", "Cabins");
        fx.category(301, GROUP_CATEGORIES, "hotels", "Hotels");
        fx.relation(FIELD_INCLUDE_CATEGORIES, 350, 300, 1);
        fx.relation(FIELD_INCLUDE_CATEGORIES, 350, 301, 2);

        let mapped = mapping_category_by_slug(&fx.pool, &fx.tenant, "accomm")
            .unwrap()
            .unwrap();
        assert_eq!(mapped.id, 350);

        let cats = related_categories(&fx.pool, &fx.tenant, 350).unwrap();
        assert_eq!(
            cats.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(),
            vec!["Cabins", "Hotels"]
        );

        assert!(mapping_category_by_slug(&fx.pool, &fx.tenant, "zzz")
            .unwrap()
            .is_none());
    }
}
