//! Import-record snapshot model.

use serde::{Deserialize, Serialize};

/// A configured import region and its postcodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    pub id: i64,
    pub title: String,
    pub postcodes: Vec<String>,
}

/// Everything the collector learned about one ATDW product record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtdwImportConfig {
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub atdw_status: Option<String>,
    pub imported: bool,
    pub has_entry: bool,
    pub entry_id: Option<i64>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub organisation: Option<String>,
    pub reason: Option<String>,
    pub last_updated: Option<String>,
    pub configured_regions: Vec<RegionSummary>,
    pub configured_postcodes: Vec<String>,
    pub matching_regions: Vec<String>,
    pub mapped_categories: Vec<String>,
    pub entry_categories: Vec<String>,
}
