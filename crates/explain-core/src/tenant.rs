//! Tenant resolution.
//!
//! Precedence: explicit request field, then the `origin:{hostname}`
//! provisioning record, then the process default. Whatever wins must pass
//! the tenant gate; resolution never yields an unvalidated identifier.

use explain_db::Tenant;
use explain_redis::{origins, KvPool};
use tracing::warn;

use crate::error::{ExplainError, ExplainResult};

/// Resolve the tenant for one request. At most one KV read.
pub async fn resolve_tenant(
    explicit: Option<&str>,
    hostname: Option<&str>,
    kv: &KvPool,
    default_tenant: &str,
) -> ExplainResult<Tenant> {
    if let Some(raw) = explicit {
        return Ok(Tenant::parse(raw)?);
    }

    if let Some(host) = hostname {
        match origins::get(kv, host).await {
            Ok(Some(value)) => {
                if let Some(name) = tenant_from_origin(&value) {
                    return Ok(Tenant::parse(&name)?);
                }
                warn!(host, value, "Malformed origin record; using default tenant");
            }
            Ok(None) => {}
            Err(e) => warn!(host, error = %e, "Origin lookup failed; using default tenant"),
        }
    }

    Tenant::parse(default_tenant).map_err(|_| {
        ExplainError::BadTenant(format!("default tenant {default_tenant:?} is invalid"))
    })
}

/// Origin records are shaped `{tenant}.{rootDomain}`; the tenant is the
/// leading label.
fn tenant_from_origin(value: &str) -> Option<String> {
    let (tenant, rest) = value.split_once('.')?;
    if tenant.is_empty() || rest.is_empty() {
        return None;
    }
    Some(tenant.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_value_parsing() {
        assert_eq!(
            tenant_from_origin("visityarra.visityarra.com.au").as_deref(),
            Some("visityarra")
        );
        assert_eq!(tenant_from_origin("solo").as_deref(), None);
        assert_eq!(tenant_from_origin(".example.com"), None);
        assert_eq!(tenant_from_origin("visityarra."), None);
    }
}
