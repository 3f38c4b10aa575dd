//! The six-step data snapshot for an ATDW import record.
//!
//! Every step reports facts; the "why" is left to the generator, armed
//! with the retrieved import source.

pub mod model;

use explain_db::queries::{categories, imports, products};
use explain_db::{DbPool, Tenant};
use serde_json::json;

use crate::error::ExplainResult;
use crate::intent::ParsedIntent;
use crate::trace::{TraceStep, TraceStepName};

pub use model::{AtdwImportConfig, RegionSummary};

/// Postcodes numerically within this window of a missed postcode are
/// offered as "nearby" context for the prose.
pub const NEARBY_POSTCODE_WINDOW: i64 = 50;
/// Cap on the nearby list.
pub const NEARBY_POSTCODE_CAP: usize = 10;

/// Run the import-domain collector.
pub async fn collect_import(
    db: &DbPool,
    tenant: &Tenant,
    intent: &ParsedIntent,
) -> ExplainResult<(AtdwImportConfig, Vec<TraceStep>)> {
    let mut config = AtdwImportConfig::default();
    let mut trace = Vec::new();

    // 1. atdw_lookup: by id, then by each name; first match wins.
    let mut record = None;
    if let Some(product_id) = &intent.atdw_product_id {
        record = imports::record_by_product_id(db, tenant, product_id)?;
    }
    if record.is_none() {
        for name in &intent.product_names {
            let hits = imports::records_by_name(db, tenant, name)?;
            if let Some(hit) = hits.into_iter().next() {
                record = Some(hit);
                break;
            }
        }
    }

    let Some(record) = record else {
        let stats = imports::table_stats(db, tenant)?;
        trace.push(
            TraceStep::readout(
                TraceStepName::AtdwLookup,
                "No ATDW record matched the given id or name",
            )
            .present(Some(false))
            .detail("totalRecords", stats.total)
            .detail("importedRecords", stats.imported)
            .detail("distinctCategories", stats.categories),
        );
        return Ok((config, trace));
    };

    let payload: serde_json::Value = record
        .payload
        .as_deref()
        .and_then(|p| serde_json::from_str(p).ok())
        .unwrap_or(serde_json::Value::Null);

    config.product_id = Some(record.product_id.clone());
    config.product_name = record.product_name.clone();
    config.category = record.category.clone();
    config.atdw_status = record.status.clone();
    config.imported = record.imported;
    config.entry_id = record.entry_id;
    config.has_entry = record.entry_id.is_some();
    config.reason = record.reason.clone();
    config.last_updated = record.date_updated.clone();
    config.postcode = payload_first_address(&payload, "postcode");
    config.city = payload_first_address(&payload, "city");
    config.organisation = payload
        .get("organisation")
        .and_then(|o| o.as_str())
        .map(str::to_string);

    trace.push(
        TraceStep::readout(
            TraceStepName::AtdwLookup,
            format!(
                "Found ATDW record {:?} ({})",
                record.product_name.as_deref().unwrap_or(&record.product_id),
                record.category.as_deref().unwrap_or("uncategorised"),
            ),
        )
        .present(Some(true))
        .detail("productId", record.product_id.as_str()),
    );

    // 2. atdw_region_config
    let regions = categories::enabled_region_categories(db, tenant)?;
    config.configured_regions = regions
        .iter()
        .map(|r| RegionSummary {
            id: r.id,
            title: r.title.clone(),
            postcodes: r.postcodes.clone(),
        })
        .collect();
    let mut configured_postcodes: Vec<String> = Vec::new();
    for region in &regions {
        for pc in &region.postcodes {
            if !configured_postcodes.contains(pc) {
                configured_postcodes.push(pc.clone());
            }
        }
    }
    config.configured_postcodes = configured_postcodes.clone();
    trace.push(
        TraceStep::readout(
            TraceStepName::AtdwRegionConfig,
            format!(
                "{} import region(s) covering {} postcode(s)",
                regions.len(),
                configured_postcodes.len()
            ),
        )
        .counted(regions.len() as i64)
        .detail(
            "regions",
            json!(regions
                .iter()
                .map(|r| json!({ "title": r.title, "postcodes": r.postcodes }))
                .collect::<Vec<_>>()),
        ),
    );

    // 3. atdw_postcode_match
    let filtering_active = !configured_postcodes.is_empty();
    let matching: Vec<String> = match &config.postcode {
        Some(pc) => regions
            .iter()
            .filter(|r| r.postcodes.iter().any(|p| p == pc))
            .map(|r| r.title.clone())
            .collect(),
        None => Vec::new(),
    };
    config.matching_regions = matching.clone();
    let in_set = !matching.is_empty();
    let mut step = TraceStep::readout(
        TraceStepName::AtdwPostcodeMatch,
        postcode_description(config.postcode.as_deref(), &matching, filtering_active),
    )
    .present(Some(in_set || !filtering_active))
    .detail("postcode", json!(config.postcode))
    .detail("matchingRegions", json!(matching));
    if filtering_active && !in_set {
        if let Some(pc) = &config.postcode {
            step = step.detail(
                "nearbyPostcodes",
                json!(nearby_postcodes(pc, &configured_postcodes)),
            );
        }
    }
    trace.push(step);

    // 4. atdw_status_eval
    trace.push(
        TraceStep::readout(
            TraceStepName::AtdwStatusEval,
            format!(
                "Status {}, {}",
                record.status.as_deref().unwrap_or("unknown"),
                if record.imported {
                    "imported to the website"
                } else {
                    "not imported"
                }
            ),
        )
        .present(Some(record.imported))
        .detail("status", json!(record.status))
        .detail("imported", record.imported)
        .detail("entryId", json!(record.entry_id))
        .detail("lastUpdated", json!(record.date_updated))
        .detail("reason", json!(record.reason)),
    );

    // 5. atdw_category_mapping
    let mut mapped: Vec<String> = Vec::new();
    let mut unmapped: Vec<String> = Vec::new();
    if let Some(category) = &record.category {
        map_classification(db, tenant, category, &mut mapped, &mut unmapped)?;
    }
    for classification in payload_classifications(&payload) {
        map_classification(db, tenant, &classification, &mut mapped, &mut unmapped)?;
    }
    mapped.dedup();
    config.mapped_categories = mapped.clone();
    if let Some(entry_id) = record.entry_id {
        config.entry_categories = categories::related_categories(db, tenant, entry_id)?
            .into_iter()
            .map(|c| c.title)
            .collect();
    }
    trace.push(
        TraceStep::readout(
            TraceStepName::AtdwCategoryMapping,
            format!(
                "{} classification(s) map to website categories, {} do not",
                mapped.len(),
                unmapped.len()
            ),
        )
        .detail("mapped", json!(mapped))
        .detail("unmapped", json!(unmapped))
        .detail("entryCategories", json!(config.entry_categories)),
    );

    // 6. atdw_entry_state / atdw_entry_link
    let entry = match record.entry_id {
        Some(entry_id) => products::entry_state(db, tenant, entry_id)?,
        None => None,
    };
    match entry {
        Some(entry) => trace.push(
            TraceStep::readout(
                TraceStepName::AtdwEntryState,
                format!(
                    "Website listing {:?} is {}",
                    entry.title,
                    if entry.enabled { "live" } else { "disabled" }
                ),
            )
            .present(Some(true))
            .detail("enabled", entry.enabled)
            .detail("customised", entry.customised)
            .detail("categoryCount", entry.category_count)
            .detail("imageCount", entry.image_count)
            .detail("expiryDate", json!(entry.expiry_date))
            .detail("typeId", json!(entry.type_id)),
        ),
        None => trace.push(
            TraceStep::readout(TraceStepName::AtdwEntryLink, "No website listing is linked")
                .present(Some(false))
                .detail("entry", "none"),
        ),
    }

    Ok((config, trace))
}

/// Pull a field from the record's first stored address.
fn payload_first_address(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload
        .get("addresses")?
        .as_array()?
        .first()?
        .get(key)?
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Vertical classifications stored in the payload.
fn payload_classifications(payload: &serde_json::Value) -> Vec<String> {
    payload
        .get("verticalClassifications")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn map_classification(
    db: &DbPool,
    tenant: &Tenant,
    classification: &str,
    mapped: &mut Vec<String>,
    unmapped: &mut Vec<String>,
) -> ExplainResult<()> {
    let slug = classification.to_lowercase();
    match categories::mapping_category_by_slug(db, tenant, &slug)? {
        Some(mapping) => {
            for category in categories::related_categories(db, tenant, mapping.id)? {
                if !mapped.contains(&category.title) {
                    mapped.push(category.title);
                }
            }
            Ok(())
        }
        None => {
            if !unmapped.contains(&classification.to_string()) {
                unmapped.push(classification.to_string());
            }
            Ok(())
        }
    }
}

/// Configured postcodes numerically within the nearby window, closest
/// first, capped.
pub fn nearby_postcodes(postcode: &str, configured: &[String]) -> Vec<String> {
    let Ok(target) = postcode.parse::<i64>() else {
        return Vec::new();
    };
    let mut candidates: Vec<(i64, String)> = configured
        .iter()
        .filter_map(|pc| {
            let n = pc.parse::<i64>().ok()?;
            let distance = (n - target).abs();
            (distance > 0 && distance <= NEARBY_POSTCODE_WINDOW).then(|| (distance, pc.clone()))
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .take(NEARBY_POSTCODE_CAP)
        .map(|(_, pc)| pc)
        .collect()
}

fn postcode_description(
    postcode: Option<&str>,
    matching: &[String],
    filtering_active: bool,
) -> String {
    match (postcode, matching.is_empty()) {
        (Some(pc), false) => format!("Postcode {pc} sits inside {}", matching.join(", ")),
        (Some(pc), true) if filtering_active => {
            format!("Postcode {pc} is outside every import region")
        }
        (Some(pc), true) => format!("Postcode {pc}; no region filtering is configured"),
        (None, _) => "The record carries no postcode".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{ParsedIntent, QuestionDomain};
    use explain_db::testing::{
        TenantFixture, FIELD_INCLUDE_CATEGORIES, GROUP_ATDW_MAPPING, GROUP_CATEGORIES,
        GROUP_REGIONS,
    };

    fn intent_for(id: Option<&str>, names: &[&str]) -> ParsedIntent {
        let mut intent =
            ParsedIntent::fallback("why not imported?", None, QuestionDomain::AtdwImport);
        intent.atdw_product_id = id.map(str::to_string);
        intent.product_names = names.iter().map(|s| s.to_string()).collect();
        intent
    }

    fn seeded() -> TenantFixture {
        let fx = TenantFixture::new("t1");
        fx.category(310, GROUP_REGIONS, "buloke", "Buloke Shire");
        fx.region_postcodes(310, &["3527", "3525"]);
        fx.category(350, GROUP_ATDW_MAPPING, "accomm", "Accommodation Mapping");
        fx.category(300, GROUP_CATEGORIES, "caravan-parks", "Caravan Parks");
        fx.relation(FIELD_INCLUDE_CATEGORIES, 350, 300, 1);
        fx
    }

    #[tokio::test]
    async fn missing_record_reports_table_stats_and_stops() {
        let fx = seeded();
        fx.atdw_record("X1", "Other Park", "ACCOMM", "ACTIVE", true, None, None, None);

        let (config, trace) = collect_import(&fx.pool, &fx.tenant, &intent_for(Some("12345"), &[]))
            .await
            .unwrap();

        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].step, TraceStepName::AtdwLookup);
        assert_eq!(trace[0].target_present, Some(false));
        assert_eq!(trace[0].details["totalRecords"], 1);
        assert!(config.product_id.is_none());
    }

    #[tokio::test]
    async fn imported_record_with_matching_postcode() {
        let fx = seeded();
        fx.product(400, "Wycheproof Caravan Park");
        fx.atdw_record(
            "AAA111",
            "Wycheproof Caravan Park",
            "ACCOMM",
            "ACTIVE",
            true,
            Some(400),
            None,
            Some(
                r#"{"title":"Wycheproof Caravan Park","organisation":"Buloke Parks Pty Ltd",
                    "addresses":[{"postcode":"3527","city":"Wycheproof"}],
                    "verticalClassifications":["ACCOMM"]}"#,
            ),
        );
        fx.relation(FIELD_INCLUDE_CATEGORIES, 400, 300, 1);

        let intent = intent_for(None, &["Wycheproof Caravan Park"]);
        let (config, trace) = collect_import(&fx.pool, &fx.tenant, &intent).await.unwrap();

        assert_eq!(trace.len(), 6);
        assert_eq!(trace[0].target_present, Some(true));
        assert_eq!(config.postcode.as_deref(), Some("3527"));
        assert_eq!(config.city.as_deref(), Some("Wycheproof"));
        assert_eq!(config.organisation.as_deref(), Some("Buloke Parks Pty Ltd"));
        assert_eq!(config.matching_regions, vec!["Buloke Shire"]);
        assert_eq!(config.mapped_categories, vec!["Caravan Parks"]);
        assert_eq!(config.entry_categories, vec!["Caravan Parks"]);

        let postcode_step = &trace[2];
        assert_eq!(postcode_step.step, TraceStepName::AtdwPostcodeMatch);
        assert_eq!(postcode_step.target_present, Some(true));

        let entry_step = trace.last().unwrap();
        assert_eq!(entry_step.step, TraceStepName::AtdwEntryState);
        assert_eq!(entry_step.details["categoryCount"], 1);
    }

    #[tokio::test]
    async fn postcode_outside_regions_lists_nearby() {
        let fx = seeded();
        fx.atdw_record(
            "BBB222",
            "Border Stay",
            "ACCOMM",
            "ACTIVE",
            false,
            None,
            Some("outside configured regions"),
            Some(r#"{"title":"Border Stay","addresses":[{"postcode":"3560"}]}"#),
        );

        let (config, trace) = collect_import(&fx.pool, &fx.tenant, &intent_for(Some("BBB222"), &[]))
            .await
            .unwrap();

        let postcode_step = &trace[2];
        assert_eq!(postcode_step.target_present, Some(false));
        assert_eq!(
            postcode_step.details["nearbyPostcodes"],
            serde_json::json!(["3527", "3525"])
        );
        assert!(!config.imported);

        let link_step = trace.last().unwrap();
        assert_eq!(link_step.step, TraceStepName::AtdwEntryLink);
        assert_eq!(link_step.target_present, Some(false));
    }

    #[tokio::test]
    async fn no_postcode_with_active_filtering_is_absent() {
        let fx = seeded();
        fx.atdw_record(
            "CCC333",
            "Mystery Stay",
            "ACCOMM",
            "ACTIVE",
            false,
            None,
            None,
            Some(r#"{"title":"Mystery Stay","addresses":[]}"#),
        );

        let (config, trace) = collect_import(&fx.pool, &fx.tenant, &intent_for(Some("CCC333"), &[]))
            .await
            .unwrap();

        assert!(config.postcode.is_none());
        assert_eq!(trace[2].target_present, Some(false));
    }

    #[tokio::test]
    async fn unmapped_classifications_are_partitioned() {
        let fx = seeded();
        fx.atdw_record(
            "DDD444",
            "Sky Tours",
            "ATTRACTION",
            "ACTIVE",
            false,
            None,
            None,
            Some(
                r#"{"title":"Sky Tours","addresses":[{"postcode":"3527"}],
                    "verticalClassifications":["BALLOONING"]}"#,
            ),
        );

        let (_, trace) = collect_import(&fx.pool, &fx.tenant, &intent_for(Some("DDD444"), &[]))
            .await
            .unwrap();

        let mapping = trace
            .iter()
            .find(|s| s.step == TraceStepName::AtdwCategoryMapping)
            .unwrap();
        assert_eq!(
            mapping.details["unmapped"],
            serde_json::json!(["ATTRACTION", "BALLOONING"])
        );
        assert_eq!(mapping.details["mapped"], serde_json::json!([]));
    }

    #[test]
    fn nearby_window_is_ordered_and_capped() {
        let configured: Vec<String> = (0..30).map(|i| format!("{}", 3500 + i * 5)).collect();
        let nearby = nearby_postcodes("3527", &configured);
        assert!(nearby.len() <= NEARBY_POSTCODE_CAP);
        assert_eq!(nearby[0], "3525");
        assert!(nearby.iter().all(|pc| {
            let n: i64 = pc.parse().unwrap();
            (n - 3527).abs() <= NEARBY_POSTCODE_WINDOW
        }));

        assert!(nearby_postcodes("not-a-number", &configured).is_empty());
    }
}
