//! Well-known CMS handles the pipeline depends on.

/// The page-builder matrix field.
pub const PAGE_BUILDER_FIELD: &str = "pageBuilder";

/// The products component block type inside the page builder.
pub const PRODUCTS_BLOCK_TYPE: &str = "products";

/// Global-context fields loaded into the schema cache.
pub const GLOBAL_FIELD_HANDLES: &[&str] = &[
    PAGE_BUILDER_FIELD,
    "roam_products_locations",
    "description",
    "nextEvent",
    "tiers",
    "roam_categories_regionPostcodes",
    "roam_categories_regionLocalities",
];

/// The product-locations field; its search-index rows back the
/// postcode → products expansion.
pub const LOCATIONS_FIELD: &str = "roam_products_locations";

/// Sections loaded into the schema cache.
pub const SECTION_HANDLES: &[&str] = &["products", "pages", "homepage"];
pub const SECTION_PRODUCTS: &str = "products";

/// Relation fields of the products component.
pub const REL_INCLUDE_CATEGORIES: &str = "includeCategories";
pub const REL_INCLUDE_REGIONS: &str = "includeRegions";
pub const REL_INCLUDE_TIERS: &str = "includeTiers";
pub const REL_INCLUDE_TAXONOMY: &str = "includeTaxonomy";
pub const REL_PRODUCTS: &str = "products";
pub const REL_INCLUDE_PRODUCTS: &str = "includeProducts";
pub const REL_EXCLUDE_PRODUCTS: &str = "excludeProducts";

/// All relation handles the products component knows about.
pub const COMPONENT_RELATION_HANDLES: &[&str] = &[
    REL_INCLUDE_CATEGORIES,
    REL_INCLUDE_REGIONS,
    REL_INCLUDE_TIERS,
    REL_INCLUDE_TAXONOMY,
    REL_PRODUCTS,
    REL_INCLUDE_PRODUCTS,
    REL_EXCLUDE_PRODUCTS,
];
