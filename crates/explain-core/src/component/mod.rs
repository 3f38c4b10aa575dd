//! The products filter chain and the generic block inspector.
//!
//! The chain transforms a block's configuration into the final product
//! list exactly the way the website renders it, emitting one trace step
//! per stage in a fixed order. Steps never reorder, whichever concurrent
//! branch finishes first.

pub mod model;

use std::collections::HashSet;

use explain_db::queries::{categories, pages, products, relations, search};
use explain_db::{DbPool, Tenant};
use serde_json::json;

use crate::error::{ExplainError, ExplainResult};
use crate::handles;
use crate::schema::SchemaCache;
use crate::trace::{TraceStep, TraceStepName};

pub use model::{BlockSnapshot, ComponentConfig, RelatedRef, SortOrder};

/// Attach field values and relations to a block row.
pub async fn load_block(
    db: &DbPool,
    tenant: &Tenant,
    schema: &SchemaCache,
    block: &pages::BlockRow,
) -> ExplainResult<BlockSnapshot> {
    let (field_values, block_relations) = tokio::join!(
        async {
            pages::block_field_values(
                db,
                tenant,
                &schema.matrix_content_table,
                block.id,
                &block.block_type,
            )
        },
        async { relations::block_relations(db, tenant, block.id) },
    );

    Ok(BlockSnapshot {
        id: block.id,
        block_type: block.block_type.clone(),
        sort_order: block.sort_order,
        field_values: field_values?,
        relations: block_relations?,
    })
}

/// Read the author's configuration out of a block snapshot.
pub fn config_from_block(block: &BlockSnapshot) -> ComponentConfig {
    let refs = |handle: &str| -> Vec<RelatedRef> {
        block
            .relation(handle)
            .iter()
            .cloned()
            .map(RelatedRef::from)
            .collect()
    };

    ComponentConfig {
        categories: refs(handles::REL_INCLUDE_CATEGORIES),
        regions: refs(handles::REL_INCLUDE_REGIONS),
        tiers: refs(handles::REL_INCLUDE_TIERS),
        taxonomy: refs(handles::REL_INCLUDE_TAXONOMY),
        explicit_products: merge_refs(
            refs(handles::REL_PRODUCTS),
            refs(handles::REL_INCLUDE_PRODUCTS),
        ),
        exclude_products: refs(handles::REL_EXCLUDE_PRODUCTS),
        limit: block.scalar_i64("limit").unwrap_or(0).max(0),
        order: SortOrder::parse(block.scalar_str("order")),
        style: block
            .scalar_str("style")
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        layout: block
            .scalar_str("layout")
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

/// Run the nine filter steps for a products block.
pub async fn run_filter_chain(
    db: &DbPool,
    tenant: &Tenant,
    schema: &SchemaCache,
    block: &BlockSnapshot,
    targets: &[i64],
) -> ExplainResult<(ComponentConfig, Vec<TraceStep>)> {
    let config = config_from_block(block);
    let products_section = schema.section(handles::SECTION_PRODUCTS).ok_or_else(|| {
        ExplainError::SchemaIncomplete(format!("tenant {tenant} has no products section"))
    })?;

    let mut trace = Vec::with_capacity(9);

    // 1. resolve_categories
    let category_ids = ids_of(&config.categories);
    let kept_categories = categories::strip_ancestors(db, tenant, &category_ids)?;
    trace.push(selection_step(
        TraceStepName::ResolveCategories,
        "categories",
        &config.categories,
        &kept_categories,
    ));

    // 2. resolve_regions
    let region_ids = ids_of(&config.regions);
    let kept_regions = categories::strip_ancestors(db, tenant, &region_ids)?;
    trace.push(selection_step(
        TraceStepName::ResolveRegions,
        "regions",
        &config.regions,
        &kept_regions,
    ));

    // 3. region_to_products
    let mut postcodes: Vec<String> = Vec::new();
    let mut by_postcode: Vec<i64> = Vec::new();
    let mut by_relation: Vec<i64> = Vec::new();
    if !kept_regions.is_empty() {
        postcodes = categories::region_postcodes(db, tenant, &kept_regions)?;
        let locations_field = schema.global_field(handles::LOCATIONS_FIELD);
        let (postcode_products, relation_products) = tokio::join!(
            async {
                match locations_field {
                    Some(field_id) => {
                        search::products_by_postcodes(db, tenant, &postcodes, field_id)
                    }
                    None => Ok(Vec::new()),
                }
            },
            async {
                relations::products_related_to_any(db, tenant, &kept_regions, products_section)
            },
        );
        by_postcode = postcode_products?;
        by_relation = relation_products?;
    }
    let region_products = union_preserve_order(&by_postcode, &by_relation);
    trace.push(
        TraceStep::with_products(
            TraceStepName::RegionToProducts,
            region_products_description(&kept_regions, &postcodes, &region_products),
            region_products.clone(),
            targets,
        )
        .detail("postcodes", json!(postcodes))
        .detail("byPostcode", by_postcode.len())
        .detail("byRelation", by_relation.len()),
    );

    // 4. resolve_taxonomy
    let taxonomy_ids = ids_of(&config.taxonomy);
    let kept_taxonomy = categories::strip_ancestors(db, tenant, &taxonomy_ids)?;
    trace.push(selection_step(
        TraceStepName::ResolveTaxonomy,
        "taxonomy terms",
        &config.taxonomy,
        &kept_taxonomy,
    ));

    // 5. main_query
    let tier_ids = ids_of(&config.tiers);
    let dimensions: Vec<&[i64]> = [&kept_categories, &tier_ids, &kept_taxonomy]
        .into_iter()
        .map(|d| d.as_slice())
        .filter(|d| !d.is_empty())
        .collect();
    let has_dimensions = !dimensions.is_empty();
    let relation_products = if has_dimensions {
        relations::intersect_relation_dimensions(db, tenant, &dimensions, products_section)?
    } else {
        Vec::new()
    };

    let main_products = match (!region_products.is_empty(), has_dimensions) {
        (true, true) => intersect_preserve_order(&region_products, &relation_products),
        (true, false) => region_products.clone(),
        (false, true) => relation_products.clone(),
        (false, false) => Vec::new(),
    };
    trace.push(
        TraceStep::with_products(
            TraceStepName::MainQuery,
            main_query_description(&main_products, &kept_categories, &tier_ids, &kept_taxonomy),
            main_products.clone(),
            targets,
        )
        .detail(
            "activeFilters",
            json!(active_filter_names(
                &kept_categories,
                &kept_regions,
                &tier_ids,
                &kept_taxonomy
            )),
        ),
    );

    // 6. merge_explicit
    let explicit_ids = ids_of(&config.explicit_products);
    let merged = if config.has_active_filters() {
        union_preserve_order(&main_products, &explicit_ids)
    } else {
        explicit_ids.clone()
    };
    trace.push(
        TraceStep::with_products(
            TraceStepName::MergeExplicit,
            if explicit_ids.is_empty() {
                "No hand-picked products to add".to_string()
            } else {
                format!("Added {} hand-picked product(s)", explicit_ids.len())
            },
            merged.clone(),
            targets,
        )
        .detail("explicitCount", explicit_ids.len()),
    );

    // 7. apply_excludes
    let exclude_ids: HashSet<i64> = ids_of(&config.exclude_products).into_iter().collect();
    let removed: Vec<i64> = merged
        .iter()
        .copied()
        .filter(|id| exclude_ids.contains(id))
        .collect();
    let after_excludes: Vec<i64> = merged
        .into_iter()
        .filter(|id| !exclude_ids.contains(id))
        .collect();
    trace.push(
        TraceStep::with_products(
            TraceStepName::ApplyExcludes,
            if removed.is_empty() {
                "No products excluded".to_string()
            } else {
                format!("Removed {} excluded product(s)", removed.len())
            },
            after_excludes.clone(),
            targets,
        )
        .detail("removed", json!(removed)),
    );

    // 8. sort
    let (sorted, sort_description) = match config.order {
        SortOrder::Alphabetically => {
            let titles = products::product_titles(db, tenant, &after_excludes)?;
            (
                sort_alphabetically(&after_excludes, &titles),
                "Ordered alphabetically by title".to_string(),
            )
        }
        SortOrder::EventDate => (
            products::order_by_event_date(db, tenant, &after_excludes)?,
            "Ordered by next event date".to_string(),
        ),
        SortOrder::Random => (
            after_excludes.clone(),
            "Random order; shuffles on each page load".to_string(),
        ),
    };
    trace.push(TraceStep::with_products(
        TraceStepName::Sort,
        sort_description,
        sorted.clone(),
        targets,
    ));

    // 9. limit
    let final_ids: Vec<i64> = sorted.iter().copied().take(config.limit as usize).collect();
    let final_titles = products::product_titles(db, tenant, &final_ids)?;
    let final_pairs: Vec<serde_json::Value> = final_ids
        .iter()
        .map(|id| {
            let title = final_titles
                .iter()
                .find(|t| t.id == *id)
                .map(|t| t.title.clone())
                .unwrap_or_default();
            json!({ "id": id, "title": title })
        })
        .collect();
    trace.push(
        TraceStep::with_products(
            TraceStepName::Limit,
            format!(
                "Showing up to {} product(s); {} made the cut",
                config.limit,
                final_ids.len()
            ),
            final_ids,
            targets,
        )
        .detail("limit", config.limit)
        .detail("products", json!(final_pairs)),
    );

    Ok((config, trace))
}

/// Present a non-products block: populated relations and non-trivial
/// scalar fields, with no filter semantics implied.
pub fn inspect_block(block: &BlockSnapshot) -> (ComponentConfig, Vec<TraceStep>) {
    let config = config_from_block(block);

    let mut relation_summary = serde_json::Map::new();
    for (handle, items) in &block.relations {
        if items.is_empty() {
            continue;
        }
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        relation_summary.insert(handle.clone(), json!(titles));
    }

    let mut field_summary = serde_json::Map::new();
    for (key, value) in &block.field_values {
        let trivial = value.is_null() || value.as_str().is_some_and(str::is_empty);
        if !trivial {
            field_summary.insert(key.clone(), value.clone());
        }
    }

    let step = TraceStep::readout(
        TraceStepName::BlockConfig,
        format!("Settings of the {} section", block.block_type),
    )
    .detail("blockType", block.block_type.as_str())
    .detail("relations", serde_json::Value::Object(relation_summary))
    .detail("fields", serde_json::Value::Object(field_summary));

    (config, vec![step])
}

/// The readout emitted when no matching page or block exists: what *is*
/// available, so the generator can ask a useful clarifying question.
pub fn available_blocks_step(
    page: Option<&pages::PageRow>,
    blocks: &[pages::BlockRow],
    wanted: &str,
) -> TraceStep {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for block in blocks {
        match counts.iter_mut().find(|(t, _)| *t == block.block_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((block.block_type.clone(), 1)),
        }
    }
    let available: Vec<serde_json::Value> = counts
        .iter()
        .map(|(t, n)| json!({ "blockType": t, "count": n }))
        .collect();

    let description = match page {
        Some(page) => format!(
            "The page {:?} has no {} section; it has {} section(s) of other kinds",
            page.uri,
            wanted,
            blocks.len()
        ),
        None => "No page matched the given address".to_string(),
    };

    TraceStep::readout(TraceStepName::BlockConfig, description)
        .detail("availableBlocks", json!(available))
}

fn ids_of(refs: &[RelatedRef]) -> Vec<i64> {
    refs.iter().map(|r| r.id).collect()
}

fn merge_refs(mut base: Vec<RelatedRef>, extra: Vec<RelatedRef>) -> Vec<RelatedRef> {
    for item in extra {
        if !base.iter().any(|existing| existing.id == item.id) {
            base.push(item);
        }
    }
    base
}

fn union_preserve_order(first: &[i64], second: &[i64]) -> Vec<i64> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut out = Vec::new();
    for id in first.iter().chain(second) {
        if seen.insert(*id) {
            out.push(*id);
        }
    }
    out
}

fn intersect_preserve_order(base: &[i64], other: &[i64]) -> Vec<i64> {
    let keep: HashSet<i64> = other.iter().copied().collect();
    base.iter().copied().filter(|id| keep.contains(id)).collect()
}

/// Stable alphabetical order: case-insensitive title, then id.
fn sort_alphabetically(ids: &[i64], titles: &[products::TitleRow]) -> Vec<i64> {
    let mut keyed: Vec<(String, i64)> = ids
        .iter()
        .map(|id| {
            let title = titles
                .iter()
                .find(|t| t.id == *id)
                .map(|t| t.title.to_lowercase())
                .unwrap_or_default();
            (title, *id)
        })
        .collect();
    keyed.sort();
    keyed.into_iter().map(|(_, id)| id).collect()
}

fn selection_step(
    name: TraceStepName,
    noun: &str,
    selected: &[RelatedRef],
    kept: &[i64],
) -> TraceStep {
    let removed: Vec<&str> = selected
        .iter()
        .filter(|r| !kept.contains(&r.id))
        .map(|r| r.title.as_str())
        .collect();
    let kept_titles: Vec<&str> = selected
        .iter()
        .filter(|r| kept.contains(&r.id))
        .map(|r| r.title.as_str())
        .collect();

    let description = if selected.is_empty() {
        format!("No {noun} selected")
    } else if removed.is_empty() {
        format!("{} {noun} selected", kept.len())
    } else {
        format!(
            "{} {noun} selected ({} parent(s) covered by a more specific choice)",
            kept.len(),
            removed.len()
        )
    };

    TraceStep::readout(name, description)
        .counted(kept.len() as i64)
        .detail("selected", json!(kept_titles))
        .detail("removedAncestors", json!(removed))
}

fn region_products_description(regions: &[i64], postcodes: &[String], found: &[i64]) -> String {
    if regions.is_empty() {
        "No regions to expand into products".to_string()
    } else {
        format!(
            "{} product(s) found across {} postcode(s) and direct region links",
            found.len(),
            postcodes.len()
        )
    }
}

fn main_query_description(
    result: &[i64],
    categories: &[i64],
    tiers: &[i64],
    taxonomy: &[i64],
) -> String {
    if categories.is_empty() && tiers.is_empty() && taxonomy.is_empty() {
        format!("{} product(s) after region filtering alone", result.len())
    } else {
        format!("{} product(s) match every active filter", result.len())
    }
}

fn active_filter_names(
    categories: &[i64],
    regions: &[i64],
    tiers: &[i64],
    taxonomy: &[i64],
) -> Vec<&'static str> {
    let mut names = Vec::new();
    if !categories.is_empty() {
        names.push("categories");
    }
    if !regions.is_empty() {
        names.push("regions");
    }
    if !tiers.is_empty() {
        names.push("tiers");
    }
    if !taxonomy.is_empty() {
        names.push("taxonomy");
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_schema;
    use explain_db::testing::{
        TenantFixture, FIELD_EXCLUDE_PRODUCTS, FIELD_INCLUDE_CATEGORIES, FIELD_INCLUDE_REGIONS,
        FIELD_INCLUDE_PRODUCTS, FIELD_PRODUCTS, GROUP_CATEGORIES, GROUP_REGIONS,
        PRODUCTS_BLOCK_TYPE_ID,
    };

    const PAGE: i64 = 100;
    const BLOCK: i64 = 200;

    async fn snapshot(fx: &TenantFixture) -> (crate::schema::SchemaCache, BlockSnapshot) {
        let schema = build_schema(&fx.pool, &fx.tenant).unwrap();
        let rows = pages::page_blocks(&fx.pool, &fx.tenant, PAGE, Some("products")).unwrap();
        let block = load_block(&fx.pool, &fx.tenant, &schema, &rows[0])
            .await
            .unwrap();
        (schema, block)
    }

    fn base_fixture(limit: Option<i64>, order: Option<&str>) -> TenantFixture {
        let fx = TenantFixture::new("t1");
        fx.page(PAGE, "stay", "Stay");
        fx.block(BLOCK, PAGE, PRODUCTS_BLOCK_TYPE_ID, 1);
        fx.products_block_content(BLOCK, limit, order, None, None);
        fx
    }

    fn step<'a>(trace: &'a [TraceStep], name: TraceStepName) -> &'a TraceStep {
        trace.iter().find(|s| s.step == name).unwrap()
    }

    #[tokio::test]
    async fn explicit_products_only() {
        let fx = base_fixture(Some(10), Some("alphabetically"));
        fx.product(401, "Zebra Stays");
        fx.product(402, "Apple Orchard");
        fx.relation(FIELD_PRODUCTS, BLOCK, 401, 1);
        fx.relation(FIELD_INCLUDE_PRODUCTS, BLOCK, 402, 1);

        let (schema, block) = snapshot(&fx).await;
        let (config, trace) = run_filter_chain(&fx.pool, &fx.tenant, &schema, &block, &[])
            .await
            .unwrap();

        assert_eq!(trace.len(), 9);
        assert_eq!(step(&trace, TraceStepName::MainQuery).count, 0);
        assert_eq!(
            step(&trace, TraceStepName::MergeExplicit).product_ids,
            vec![401, 402]
        );
        assert_eq!(
            step(&trace, TraceStepName::ApplyExcludes).product_ids,
            vec![401, 402]
        );
        // alphabetical: Apple before Zebra
        assert_eq!(step(&trace, TraceStepName::Limit).product_ids, vec![402, 401]);
        assert_eq!(config.explicit_products.len(), 2);
    }

    #[tokio::test]
    async fn limit_zero_emits_all_steps_with_empty_final() {
        let fx = base_fixture(Some(0), None);
        fx.product(401, "Lodge");
        fx.relation(FIELD_PRODUCTS, BLOCK, 401, 1);

        let (schema, block) = snapshot(&fx).await;
        let (_, trace) = run_filter_chain(&fx.pool, &fx.tenant, &schema, &block, &[])
            .await
            .unwrap();

        assert_eq!(trace.len(), 9);
        assert_eq!(step(&trace, TraceStepName::MergeExplicit).count, 1);
        let last = trace.last().unwrap();
        assert_eq!(last.step, TraceStepName::Limit);
        assert!(last.product_ids.is_empty());
        assert_eq!(last.count, 0);
    }

    #[tokio::test]
    async fn region_filtering_unions_postcode_and_relation_products() {
        let fx = base_fixture(Some(10), None);
        fx.category(310, GROUP_REGIONS, "valley", "Valley");
        fx.region_postcodes(310, &["3777"]);
        fx.product(401, "Postcode Match");
        fx.locations_keywords(401, "healesville 3777");
        fx.product(402, "Direct Relation");
        fx.relation(FIELD_INCLUDE_REGIONS, 402, 310, 1);
        fx.product(403, "Yarra Lodge"); // elsewhere, the target
        fx.locations_keywords(403, "melbourne 3000");
        fx.relation(FIELD_INCLUDE_REGIONS, BLOCK, 310, 1);

        let (schema, block) = snapshot(&fx).await;
        let targets = vec![403];
        let (_, trace) = run_filter_chain(&fx.pool, &fx.tenant, &schema, &block, &targets)
            .await
            .unwrap();

        let region_step = step(&trace, TraceStepName::RegionToProducts);
        assert_eq!(region_step.product_ids, vec![401, 402]);
        assert_eq!(region_step.target_present, Some(false));
        assert_eq!(region_step.details["byPostcode"], 1);
        assert_eq!(region_step.details["byRelation"], 1);

        // the target stays absent through to the end
        for name in [
            TraceStepName::MainQuery,
            TraceStepName::MergeExplicit,
            TraceStepName::ApplyExcludes,
            TraceStepName::Sort,
            TraceStepName::Limit,
        ] {
            assert_eq!(step(&trace, name).target_present, Some(false), "{name:?}");
        }
    }

    #[tokio::test]
    async fn excludes_subtract_and_targets_flip() {
        let fx = base_fixture(Some(10), None);
        fx.product(401, "Keeper");
        fx.product(402, "Dropped");
        fx.relation(FIELD_PRODUCTS, BLOCK, 401, 1);
        fx.relation(FIELD_PRODUCTS, BLOCK, 402, 2);
        fx.relation(FIELD_EXCLUDE_PRODUCTS, BLOCK, 402, 1);

        let (schema, block) = snapshot(&fx).await;
        let targets = vec![402];
        let (_, trace) = run_filter_chain(&fx.pool, &fx.tenant, &schema, &block, &targets)
            .await
            .unwrap();

        assert_eq!(step(&trace, TraceStepName::MergeExplicit).target_present, Some(true));
        let excludes = step(&trace, TraceStepName::ApplyExcludes);
        assert_eq!(excludes.product_ids, vec![401]);
        assert_eq!(excludes.target_present, Some(false));
        assert_eq!(excludes.details["removed"], json!([402]));
    }

    #[tokio::test]
    async fn category_ancestors_removed_before_querying() {
        let fx = base_fixture(Some(10), None);
        fx.category(300, GROUP_CATEGORIES, "accommodation", "Accommodation");
        fx.category(301, GROUP_CATEGORIES, "cabins", "Cabins");
        fx.structure(1, 300, 1, 4);
        fx.structure(1, 301, 2, 3);
        fx.product(401, "Cabin Stay");
        fx.product(402, "Hotel Stay");
        fx.relation(FIELD_INCLUDE_CATEGORIES, 401, 301, 1);
        fx.relation(FIELD_INCLUDE_CATEGORIES, 402, 300, 1);
        fx.relation(FIELD_INCLUDE_CATEGORIES, BLOCK, 300, 1);
        fx.relation(FIELD_INCLUDE_CATEGORIES, BLOCK, 301, 2);

        let (schema, block) = snapshot(&fx).await;
        let (_, trace) = run_filter_chain(&fx.pool, &fx.tenant, &schema, &block, &[])
            .await
            .unwrap();

        let cats = step(&trace, TraceStepName::ResolveCategories);
        assert_eq!(cats.count, 1);
        assert_eq!(cats.details["selected"], json!(["Cabins"]));
        assert_eq!(cats.details["removedAncestors"], json!(["Accommodation"]));
        // only the cabin product matches the deepest category
        assert_eq!(step(&trace, TraceStepName::MainQuery).product_ids, vec![401]);
    }

    #[tokio::test]
    async fn event_date_ordering_is_db_side() {
        let fx = base_fixture(Some(10), Some("eventDate"));
        fx.product(401, "Later Festival");
        fx.product(402, "Sooner Market");
        fx.product(403, "No Event");
        fx.next_event(401, "2024-10-01");
        fx.next_event(402, "2024-08-15");
        for (i, id) in [401, 402, 403].iter().enumerate() {
            fx.relation(FIELD_PRODUCTS, BLOCK, *id, (i + 1) as i64);
        }

        let (schema, block) = snapshot(&fx).await;
        let (config, trace) = run_filter_chain(&fx.pool, &fx.tenant, &schema, &block, &[])
            .await
            .unwrap();

        assert_eq!(config.order, SortOrder::EventDate);
        assert_eq!(step(&trace, TraceStepName::Sort).product_ids, vec![402, 401, 403]);
    }

    #[tokio::test]
    async fn final_step_carries_title_pairs() {
        let fx = base_fixture(Some(1), None);
        fx.product(401, "Apple");
        fx.product(402, "Zebra");
        fx.relation(FIELD_PRODUCTS, BLOCK, 401, 1);
        fx.relation(FIELD_PRODUCTS, BLOCK, 402, 2);

        let (schema, block) = snapshot(&fx).await;
        let (_, trace) = run_filter_chain(&fx.pool, &fx.tenant, &schema, &block, &[])
            .await
            .unwrap();

        let last = step(&trace, TraceStepName::Limit);
        assert_eq!(last.count, 1);
        assert_eq!(last.details["products"], json!([{ "id": 401, "title": "Apple" }]));
    }

    #[tokio::test]
    async fn inspector_summarises_non_products_block() {
        let fx = TenantFixture::new("t1");
        fx.page(PAGE, "stay", "Stay");
        fx.block(BLOCK, PAGE, explain_db::testing::HEADING_BLOCK_TYPE_ID, 1);
        fx.heading_block_content(BLOCK, "Places to stay");

        let schema = build_schema(&fx.pool, &fx.tenant).unwrap();
        let rows = pages::page_blocks(&fx.pool, &fx.tenant, PAGE, None).unwrap();
        let block = load_block(&fx.pool, &fx.tenant, &schema, &rows[0])
            .await
            .unwrap();
        let (_, trace) = inspect_block(&block);

        assert_eq!(trace.len(), 1);
        let readout = &trace[0];
        assert_eq!(readout.step, TraceStepName::BlockConfig);
        assert_eq!(readout.target_present, None);
        assert_eq!(readout.details["fields"]["text"], "Places to stay");
    }

    #[test]
    fn available_blocks_summary() {
        let page = pages::PageRow {
            id: 1,
            uri: "stay".to_string(),
            title: Some("Stay".to_string()),
        };
        let blocks = vec![
            pages::BlockRow { id: 1, block_type: "heading".to_string(), sort_order: 1 },
            pages::BlockRow { id: 2, block_type: "heading".to_string(), sort_order: 2 },
            pages::BlockRow { id: 3, block_type: "gallery".to_string(), sort_order: 3 },
        ];
        let step = available_blocks_step(Some(&page), &blocks, "products");
        assert_eq!(
            step.details["availableBlocks"],
            json!([
                { "blockType": "heading", "count": 2 },
                { "blockType": "gallery", "count": 1 }
            ])
        );

        let missing = available_blocks_step(None, &[], "products");
        assert!(missing.description.contains("No page"));
    }
}
