//! Process-level configuration.

use std::path::PathBuf;

/// Options recognised by the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Tenant used when neither the request nor the hostname names one.
    pub default_tenant: String,
    /// Semantic-search corpus holding the platform source chunks.
    pub corpus: String,
    /// Environment label for logs and the health surface.
    pub environment: String,
    /// Directory of per-tenant database files. `None` means the tenant
    /// schemas are already attached (tests do this).
    pub tenant_db_dir: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn new(default_tenant: &str, corpus: &str, environment: &str) -> Self {
        Self {
            default_tenant: default_tenant.to_string(),
            corpus: corpus.to_string(),
            environment: environment.to_string(),
            tenant_db_dir: None,
        }
    }

    pub fn with_tenant_db_dir(mut self, dir: PathBuf) -> Self {
        self.tenant_db_dir = Some(dir);
        self
    }
}
