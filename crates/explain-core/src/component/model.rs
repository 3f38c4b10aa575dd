//! Products-component configuration model.

use std::collections::{BTreeMap, HashMap};

use explain_db::queries::relations::RelatedItem;
use serde::{Deserialize, Serialize};

/// A related element reference on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedRef {
    pub id: i64,
    pub title: String,
}

impl From<RelatedItem> for RelatedRef {
    fn from(item: RelatedItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
        }
    }
}

/// The component's ordering setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "alphabetically")]
    Alphabetically,
    #[serde(rename = "eventDate")]
    EventDate,
    #[serde(rename = "random")]
    Random,
}

impl SortOrder {
    /// Parse the stored scalar; anything unrecognised falls back to
    /// alphabetical, the component's authoring default.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("eventDate") => Self::EventDate,
            Some("random") => Self::Random,
            _ => Self::Alphabetically,
        }
    }
}

/// Everything an author configured on a products component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    pub categories: Vec<RelatedRef>,
    pub regions: Vec<RelatedRef>,
    pub tiers: Vec<RelatedRef>,
    pub taxonomy: Vec<RelatedRef>,
    pub explicit_products: Vec<RelatedRef>,
    pub exclude_products: Vec<RelatedRef>,
    pub limit: i64,
    pub order: SortOrder,
    pub style: Option<String>,
    pub layout: Option<String>,
}

impl ComponentConfig {
    /// Whether any list-narrowing filter is configured.
    pub fn has_active_filters(&self) -> bool {
        !self.categories.is_empty()
            || !self.regions.is_empty()
            || !self.tiers.is_empty()
            || !self.taxonomy.is_empty()
    }
}

/// A page-builder block with its field values and relations attached.
#[derive(Debug, Clone)]
pub struct BlockSnapshot {
    pub id: i64,
    pub block_type: String,
    pub sort_order: i64,
    pub field_values: HashMap<String, serde_json::Value>,
    pub relations: BTreeMap<String, Vec<RelatedItem>>,
}

impl BlockSnapshot {
    pub fn relation(&self, handle: &str) -> &[RelatedItem] {
        self.relations.get(handle).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scalar_str(&self, key: &str) -> Option<&str> {
        self.field_values.get(key)?.as_str()
    }

    pub fn scalar_i64(&self, key: &str) -> Option<i64> {
        let value = self.field_values.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_parsing() {
        assert_eq!(SortOrder::parse(Some("alphabetically")), SortOrder::Alphabetically);
        assert_eq!(SortOrder::parse(Some("eventDate")), SortOrder::EventDate);
        assert_eq!(SortOrder::parse(Some("random")), SortOrder::Random);
        assert_eq!(SortOrder::parse(Some("mystery")), SortOrder::Alphabetically);
        assert_eq!(SortOrder::parse(None), SortOrder::Alphabetically);
    }

    #[test]
    fn config_serialises_camel_case() {
        let config = ComponentConfig {
            explicit_products: vec![RelatedRef {
                id: 1,
                title: "A".to_string(),
            }],
            order: SortOrder::EventDate,
            ..ComponentConfig::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("explicitProducts").is_some());
        assert!(json.get("excludeProducts").is_some());
        assert_eq!(json["order"], "eventDate");
    }

    #[test]
    fn scalar_accessors_coerce() {
        let mut values = HashMap::new();
        values.insert("limit".to_string(), serde_json::Value::from("12"));
        let block = BlockSnapshot {
            id: 1,
            block_type: "products".to_string(),
            sort_order: 1,
            field_values: values,
            relations: BTreeMap::new(),
        };
        assert_eq!(block.scalar_i64("limit"), Some(12));
        assert_eq!(block.scalar_i64("missing"), None);
    }
}
