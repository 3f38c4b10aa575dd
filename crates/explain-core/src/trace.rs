//! Trace steps: ordered, verifiable snapshots of the pipeline's work.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Enumerated step names, serialised in wire form (`resolve_categories`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepName {
    ResolveCategories,
    ResolveRegions,
    RegionToProducts,
    ResolveTaxonomy,
    MainQuery,
    MergeExplicit,
    ApplyExcludes,
    Sort,
    Limit,
    BlockConfig,
    AtdwLookup,
    AtdwRegionConfig,
    AtdwPostcodeMatch,
    AtdwStatusEval,
    AtdwCategoryMapping,
    AtdwEntryState,
    AtdwEntryLink,
}

impl TraceStepName {
    /// Human label used when a step is rendered into a prompt. Internal
    /// step names never reach the model.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResolveCategories => "Category selection",
            Self::ResolveRegions => "Region selection",
            Self::RegionToProducts => "Products in the selected regions",
            Self::ResolveTaxonomy => "Experience type selection",
            Self::MainQuery => "Combined filters",
            Self::MergeExplicit => "Hand-picked products",
            Self::ApplyExcludes => "Excluded products",
            Self::Sort => "Ordering",
            Self::Limit => "Display limit",
            Self::BlockConfig => "Component settings",
            Self::AtdwLookup => "ATDW record",
            Self::AtdwRegionConfig => "Import regions",
            Self::AtdwPostcodeMatch => "Postcode check",
            Self::AtdwStatusEval => "Import status",
            Self::AtdwCategoryMapping => "Category mapping",
            Self::AtdwEntryState => "Website listing",
            Self::AtdwEntryLink => "Website listing link",
        }
    }
}

/// One step of a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub step: TraceStepName,
    pub description: String,
    pub count: i64,
    pub product_ids: Vec<i64>,
    pub target_present: Option<bool>,
    #[serde(default)]
    pub details: serde_json::Map<String, Value>,
}

impl TraceStep {
    /// A step with no product set, i.e. a configuration readout.
    /// `targetPresent` stays `null`.
    pub fn readout(step: TraceStepName, description: impl Into<String>) -> Self {
        Self {
            step,
            description: description.into(),
            count: 0,
            product_ids: Vec::new(),
            target_present: None,
            details: serde_json::Map::new(),
        }
    }

    /// A step whose surviving product set is `ids`. Keeps
    /// `count == |productIds|` and derives `targetPresent` from the
    /// targets by construction.
    pub fn with_products(
        step: TraceStepName,
        description: impl Into<String>,
        ids: Vec<i64>,
        targets: &[i64],
    ) -> Self {
        let target_present = target_present(&ids, targets);
        Self {
            step,
            description: description.into(),
            count: ids.len() as i64,
            product_ids: ids,
            target_present,
            details: serde_json::Map::new(),
        }
    }

    /// Set a count without a product id list (e.g. region counts).
    pub fn counted(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    /// Force the target predicate (import steps use domain-specific
    /// presence rules).
    pub fn present(mut self, present: Option<bool>) -> Self {
        self.target_present = present;
        self
    }

    /// Attach a detail value.
    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Tri-state presence: `None` when no targets were supplied, otherwise
/// whether any target survives in `ids`.
pub fn target_present(ids: &[i64], targets: &[i64]) -> Option<bool> {
    if targets.is_empty() {
        None
    } else {
        Some(targets.iter().any(|t| ids.contains(t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_snake_case() {
        let json = serde_json::to_string(&TraceStepName::RegionToProducts).unwrap();
        assert_eq!(json, "\"region_to_products\"");
        let json = serde_json::to_string(&TraceStepName::AtdwPostcodeMatch).unwrap();
        assert_eq!(json, "\"atdw_postcode_match\"");
    }

    #[test]
    fn count_tracks_product_ids() {
        let step = TraceStep::with_products(
            TraceStepName::MainQuery,
            "combined",
            vec![1, 2, 3],
            &[2],
        );
        assert_eq!(step.count, 3);
        assert_eq!(step.count as usize, step.product_ids.len());
        assert_eq!(step.target_present, Some(true));
    }

    #[test]
    fn target_predicate_tristate() {
        assert_eq!(target_present(&[1, 2], &[]), None);
        assert_eq!(target_present(&[1, 2], &[2]), Some(true));
        assert_eq!(target_present(&[1, 2], &[9]), Some(false));
        assert_eq!(target_present(&[], &[9]), Some(false));
    }

    #[test]
    fn readout_has_null_predicate() {
        let step = TraceStep::readout(TraceStepName::BlockConfig, "settings");
        assert_eq!(step.target_present, None);
        assert_eq!(step.count, 0);
    }

    #[test]
    fn serialises_camel_case() {
        let step = TraceStep::with_products(TraceStepName::Limit, "slice", vec![5], &[5])
            .detail("limit", 4);
        let json = serde_json::to_value(&step).unwrap();
        assert!(json.get("productIds").is_some());
        assert!(json.get("targetPresent").is_some());
        assert_eq!(json["details"]["limit"], 4);
    }
}
