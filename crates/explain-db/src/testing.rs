//! In-memory tenant fixtures for tests.
//!
//! Builds an attached tenant schema with the CMS tables this crate
//! queries, plus seed helpers that keep element/content/entry rows
//! consistent. Production tenants are authored by the CMS itself; this
//! module exists so tests can stand up a believable one in memory.

use crate::pool::DbPool;
use crate::tenant::Tenant;

/// Well-known section ids seeded by the fixture.
pub const SECTION_PRODUCTS: i64 = 1;
pub const SECTION_PAGES: i64 = 2;
pub const SECTION_HOMEPAGE: i64 = 3;

/// Well-known global field ids seeded by the fixture.
pub const FIELD_PAGE_BUILDER: i64 = 10;
pub const FIELD_LOCATIONS: i64 = 11;
pub const FIELD_DESCRIPTION: i64 = 12;
pub const FIELD_NEXT_EVENT: i64 = 13;
pub const FIELD_TIERS: i64 = 14;
pub const FIELD_REGION_POSTCODES: i64 = 15;
pub const FIELD_REGION_LOCALITIES: i64 = 16;

/// Component-config field ids (context `matrixBlockType:{uid}`).
pub const FIELD_INCLUDE_CATEGORIES: i64 = 21;
pub const FIELD_INCLUDE_REGIONS: i64 = 22;
pub const FIELD_INCLUDE_TIERS: i64 = 23;
pub const FIELD_INCLUDE_TAXONOMY: i64 = 24;
pub const FIELD_PRODUCTS: i64 = 25;
pub const FIELD_INCLUDE_PRODUCTS: i64 = 26;
pub const FIELD_EXCLUDE_PRODUCTS: i64 = 27;

/// Category group ids seeded by the fixture.
pub const GROUP_REGIONS: i64 = 1;
pub const GROUP_CATEGORIES: i64 = 2;
pub const GROUP_ATDW_MAPPING: i64 = 3;
pub const GROUP_TAXONOMY: i64 = 4;

/// Uid of the seeded `products` block type.
pub const PRODUCTS_BLOCK_TYPE_UID: &str = "bt-products";
/// Id of the seeded `products` block type.
pub const PRODUCTS_BLOCK_TYPE_ID: i64 = 1;
/// Id of the seeded `heading` block type.
pub const HEADING_BLOCK_TYPE_ID: i64 = 2;

/// An in-memory tenant with the full CMS table set attached.
pub struct TenantFixture {
    pub pool: DbPool,
    pub tenant: Tenant,
}

impl TenantFixture {
    /// Create the fixture, attach the tenant schema, and seed the
    /// well-known sections, fields, groups, and block types.
    pub fn new(name: &str) -> Self {
        let pool = DbPool::in_memory().expect("in-memory pool");
        let tenant = Tenant::parse(name).expect("fixture tenant name");
        pool.attach_tenant_memory(&tenant).expect("attach tenant");

        let fixture = Self { pool, tenant };
        fixture.create_tables();
        fixture.seed_well_known();
        fixture
    }

    fn create_tables(&self) {
        let t = self.tenant.as_str();
        let ddl = format!(
            r#"
            CREATE TABLE {t}.craft_elements (
                id INTEGER PRIMARY KEY,
                type TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                archived INTEGER NOT NULL DEFAULT 0,
                draftId INTEGER,
                revisionId INTEGER,
                dateCreated TEXT,
                dateUpdated TEXT,
                dateDeleted TEXT
            );
            CREATE TABLE {t}.craft_elements_sites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                elementId INTEGER NOT NULL,
                siteId INTEGER NOT NULL DEFAULT 1,
                slug TEXT,
                uri TEXT,
                enabled INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE {t}.craft_content (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                elementId INTEGER NOT NULL,
                siteId INTEGER NOT NULL DEFAULT 1,
                title TEXT,
                field_description TEXT,
                field_nextEvent TEXT,
                field_customised INTEGER,
                field_roam_categories_regionPostcodes TEXT,
                field_roam_categories_regionLocalities TEXT
            );
            CREATE TABLE {t}.craft_sections (
                id INTEGER PRIMARY KEY,
                handle TEXT NOT NULL,
                name TEXT
            );
            CREATE TABLE {t}.craft_entries (
                id INTEGER PRIMARY KEY,
                sectionId INTEGER NOT NULL,
                typeId INTEGER,
                postDate TEXT,
                expiryDate TEXT
            );
            CREATE TABLE {t}.craft_fields (
                id INTEGER PRIMARY KEY,
                handle TEXT NOT NULL,
                context TEXT NOT NULL DEFAULT 'global',
                name TEXT
            );
            CREATE TABLE {t}.craft_matrixblocktypes (
                id INTEGER PRIMARY KEY,
                fieldId INTEGER NOT NULL,
                handle TEXT NOT NULL,
                name TEXT,
                uid TEXT NOT NULL
            );
            CREATE TABLE {t}.craft_matrixblocks (
                id INTEGER PRIMARY KEY,
                ownerId INTEGER NOT NULL,
                fieldId INTEGER NOT NULL,
                typeId INTEGER NOT NULL,
                sortOrder INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE {t}.craft_matrixcontent_pagebuilder (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                elementId INTEGER NOT NULL,
                siteId INTEGER NOT NULL DEFAULT 1,
                dateCreated TEXT,
                dateUpdated TEXT,
                uid TEXT,
                field_products_limit INTEGER,
                field_products_order TEXT,
                field_products_style TEXT,
                field_products_layout TEXT,
                field_heading_text TEXT
            );
            CREATE TABLE {t}.craft_relations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fieldId INTEGER NOT NULL,
                sourceId INTEGER NOT NULL,
                targetId INTEGER NOT NULL,
                sortOrder INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE {t}.craft_categorygroups (
                id INTEGER PRIMARY KEY,
                handle TEXT NOT NULL,
                name TEXT
            );
            CREATE TABLE {t}.craft_categories (
                id INTEGER PRIMARY KEY,
                groupId INTEGER NOT NULL
            );
            CREATE TABLE {t}.craft_structureelements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                structureId INTEGER NOT NULL,
                elementId INTEGER NOT NULL,
                lft INTEGER NOT NULL,
                rgt INTEGER NOT NULL,
                level INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE {t}.craft_searchindex (
                elementId INTEGER NOT NULL,
                attribute TEXT NOT NULL DEFAULT 'field',
                fieldId INTEGER NOT NULL DEFAULT 0,
                siteId INTEGER NOT NULL DEFAULT 1,
                keywords TEXT NOT NULL
            );
            CREATE TABLE {t}.craft_atdw_products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                productId TEXT NOT NULL,
                productName TEXT,
                category TEXT,
                status TEXT,
                imported INTEGER NOT NULL DEFAULT 0,
                entryId INTEGER,
                reason TEXT,
                payload TEXT,
                dateCreated TEXT,
                dateUpdated TEXT
            );
            "#
        );
        self.pool
            .with_conn(|conn| {
                conn.execute_batch(&ddl)?;
                Ok(())
            })
            .expect("create tenant tables");
    }

    fn seed_well_known(&self) {
        let ctx = format!("matrixBlockType:{PRODUCTS_BLOCK_TYPE_UID}");
        self.section(SECTION_PRODUCTS, "products");
        self.section(SECTION_PAGES, "pages");
        self.section(SECTION_HOMEPAGE, "homepage");

        self.field(FIELD_PAGE_BUILDER, "pageBuilder", "global");
        self.field(FIELD_LOCATIONS, "roam_products_locations", "global");
        self.field(FIELD_DESCRIPTION, "description", "global");
        self.field(FIELD_NEXT_EVENT, "nextEvent", "global");
        self.field(FIELD_TIERS, "tiers", "global");
        self.field(FIELD_REGION_POSTCODES, "roam_categories_regionPostcodes", "global");
        self.field(FIELD_REGION_LOCALITIES, "roam_categories_regionLocalities", "global");

        self.field(FIELD_INCLUDE_CATEGORIES, "includeCategories", &ctx);
        self.field(FIELD_INCLUDE_REGIONS, "includeRegions", &ctx);
        self.field(FIELD_INCLUDE_TIERS, "includeTiers", &ctx);
        self.field(FIELD_INCLUDE_TAXONOMY, "includeTaxonomy", &ctx);
        self.field(FIELD_PRODUCTS, "products", &ctx);
        self.field(FIELD_INCLUDE_PRODUCTS, "includeProducts", &ctx);
        self.field(FIELD_EXCLUDE_PRODUCTS, "excludeProducts", &ctx);

        self.exec(
            "INSERT INTO {t}.craft_matrixblocktypes (id, fieldId, handle, name, uid)
             VALUES (?1, ?2, 'products', 'Products', ?3)",
            rusqlite::params![PRODUCTS_BLOCK_TYPE_ID, FIELD_PAGE_BUILDER, PRODUCTS_BLOCK_TYPE_UID],
        );
        self.exec(
            "INSERT INTO {t}.craft_matrixblocktypes (id, fieldId, handle, name, uid)
             VALUES (?1, ?2, 'heading', 'Heading', 'bt-heading')",
            rusqlite::params![HEADING_BLOCK_TYPE_ID, FIELD_PAGE_BUILDER],
        );

        self.exec(
            "INSERT INTO {t}.craft_categorygroups (id, handle, name) VALUES
             (?1, 'regions', 'Regions'),
             (?2, 'categories', 'Categories'),
             (?3, 'atdwCategoryMapping', 'ATDW Category Mapping'),
             (?4, 'taxonomy', 'Taxonomy')",
            rusqlite::params![GROUP_REGIONS, GROUP_CATEGORIES, GROUP_ATDW_MAPPING, GROUP_TAXONOMY],
        );
    }

    /// Execute tenant-prefixed SQL (`{t}` is replaced with the schema).
    pub fn exec(&self, sql: &str, params: impl rusqlite::Params) {
        let sql = sql.replace("{t}", self.tenant.as_str());
        self.pool
            .with_conn(|conn| {
                conn.execute(&sql, params)?;
                Ok(())
            })
            .expect("fixture exec");
    }

    fn section(&self, id: i64, handle: &str) {
        self.exec(
            "INSERT INTO {t}.craft_sections (id, handle, name) VALUES (?1, ?2, ?2)",
            rusqlite::params![id, handle],
        );
    }

    pub fn field(&self, id: i64, handle: &str, context: &str) {
        self.exec(
            "INSERT INTO {t}.craft_fields (id, handle, context, name) VALUES (?1, ?2, ?3, ?2)",
            rusqlite::params![id, handle, context],
        );
    }

    /// Insert a bare element row.
    pub fn element(&self, id: i64, kind: &str, enabled: bool) {
        self.exec(
            "INSERT INTO {t}.craft_elements (id, type, enabled, dateCreated, dateUpdated)
             VALUES (?1, ?2, ?3, '2024-01-01 00:00:00', '2024-01-01 00:00:00')",
            rusqlite::params![id, kind, enabled],
        );
    }

    /// Insert a page entry with a uri.
    pub fn page(&self, id: i64, uri: &str, title: &str) {
        self.element(id, "entry", true);
        self.exec(
            "INSERT INTO {t}.craft_entries (id, sectionId) VALUES (?1, ?2)",
            rusqlite::params![id, SECTION_PAGES],
        );
        self.exec(
            "INSERT INTO {t}.craft_elements_sites (elementId, uri, slug) VALUES (?1, ?2, ?2)",
            rusqlite::params![id, uri],
        );
        self.exec(
            "INSERT INTO {t}.craft_content (elementId, title) VALUES (?1, ?2)",
            rusqlite::params![id, title],
        );
    }

    /// Insert a product entry.
    pub fn product(&self, id: i64, title: &str) {
        self.element(id, "entry", true);
        self.exec(
            "INSERT INTO {t}.craft_entries (id, sectionId) VALUES (?1, ?2)",
            rusqlite::params![id, SECTION_PRODUCTS],
        );
        self.exec(
            "INSERT INTO {t}.craft_content (elementId, title) VALUES (?1, ?2)",
            rusqlite::params![id, title],
        );
    }

    /// Set a product's next-event date.
    pub fn next_event(&self, product_id: i64, date: &str) {
        self.exec(
            "UPDATE {t}.craft_content SET field_nextEvent = ?2 WHERE elementId = ?1",
            rusqlite::params![product_id, date],
        );
    }

    /// Insert a category element in a group.
    pub fn category(&self, id: i64, group_id: i64, slug: &str, title: &str) {
        self.element(id, "category", true);
        self.exec(
            "INSERT INTO {t}.craft_categories (id, groupId) VALUES (?1, ?2)",
            rusqlite::params![id, group_id],
        );
        self.exec(
            "INSERT INTO {t}.craft_elements_sites (elementId, slug) VALUES (?1, ?2)",
            rusqlite::params![id, slug],
        );
        self.exec(
            "INSERT INTO {t}.craft_content (elementId, title) VALUES (?1, ?2)",
            rusqlite::params![id, title],
        );
    }

    /// Place an element in a nested-set structure.
    pub fn structure(&self, structure_id: i64, element_id: i64, lft: i64, rgt: i64) {
        self.exec(
            "INSERT INTO {t}.craft_structureelements (structureId, elementId, lft, rgt)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![structure_id, element_id, lft, rgt],
        );
    }

    /// Insert a page-builder block on a page.
    pub fn block(&self, id: i64, owner_id: i64, type_id: i64, sort_order: i64) {
        self.element(id, "matrixblock", true);
        self.exec(
            "INSERT INTO {t}.craft_matrixblocks (id, ownerId, fieldId, typeId, sortOrder)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, owner_id, FIELD_PAGE_BUILDER, type_id, sort_order],
        );
    }

    /// Insert the matrix-content row for a products block.
    pub fn products_block_content(
        &self,
        block_id: i64,
        limit: Option<i64>,
        order: Option<&str>,
        style: Option<&str>,
        layout: Option<&str>,
    ) {
        self.exec(
            "INSERT INTO {t}.craft_matrixcontent_pagebuilder
             (elementId, field_products_limit, field_products_order,
              field_products_style, field_products_layout)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![block_id, limit, order, style, layout],
        );
    }

    /// Insert the matrix-content row for a heading block.
    pub fn heading_block_content(&self, block_id: i64, text: &str) {
        self.exec(
            "INSERT INTO {t}.craft_matrixcontent_pagebuilder (elementId, field_heading_text)
             VALUES (?1, ?2)",
            rusqlite::params![block_id, text],
        );
    }

    /// Insert a relation row.
    pub fn relation(&self, field_id: i64, source_id: i64, target_id: i64, sort_order: i64) {
        self.exec(
            "INSERT INTO {t}.craft_relations (fieldId, sourceId, targetId, sortOrder)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![field_id, source_id, target_id, sort_order],
        );
    }

    /// Index a product's locations text (keywords are space-padded).
    pub fn locations_keywords(&self, product_id: i64, keywords: &str) {
        self.exec(
            "INSERT INTO {t}.craft_searchindex (elementId, fieldId, keywords)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![product_id, FIELD_LOCATIONS, format!(" {} ", keywords.trim())],
        );
    }

    /// Set a region category's postcode table field.
    pub fn region_postcodes(&self, category_id: i64, postcodes: &[&str]) {
        let rows: Vec<serde_json::Value> = postcodes
            .iter()
            .enumerate()
            .map(|(i, pc)| serde_json::json!({ "col1": format!("row{}", i + 1), "col2": pc }))
            .collect();
        let json = serde_json::to_string(&rows).expect("postcode json");
        self.exec(
            "UPDATE {t}.craft_content SET field_roam_categories_regionPostcodes = ?2
             WHERE elementId = ?1",
            rusqlite::params![category_id, json],
        );
    }

    /// Insert an ATDW import record.
    #[allow(clippy::too_many_arguments)]
    pub fn atdw_record(
        &self,
        product_id: &str,
        name: &str,
        category: &str,
        status: &str,
        imported: bool,
        entry_id: Option<i64>,
        reason: Option<&str>,
        payload: Option<&str>,
    ) {
        self.exec(
            "INSERT INTO {t}.craft_atdw_products
             (productId, productName, category, status, imported, entryId, reason, payload,
              dateCreated, dateUpdated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                     '2024-01-01 00:00:00', '2024-06-01 00:00:00')",
            rusqlite::params![product_id, name, category, status, imported, entry_id, reason, payload],
        );
    }
}
