//! Validated tenant identifiers.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::pool::{DbError, DbResult};

static TENANT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("tenant regex"));

static MATRIX_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^craft_matrixcontent_[a-z0-9_]+$").expect("table regex"));

/// A validated tenant identifier.
///
/// The identifier is interpolated into SQL as a schema prefix, so the only
/// constructor is [`Tenant::parse`], which enforces
/// `^[a-z][a-z0-9_]{0,63}$`. Holding a `Tenant` means the gate has passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tenant(String);

impl Tenant {
    /// Validate a raw identifier. Fails before any SQL can be composed.
    pub fn parse(raw: &str) -> DbResult<Self> {
        if TENANT_RE.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(DbError::InvalidTenant(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Qualify a table name with this tenant's schema.
    pub fn table(&self, name: &str) -> String {
        format!("{}.{}", self.0, name)
    }

    /// Qualify a matrix-content table after re-checking its shape.
    ///
    /// The table name is derived from a field handle at runtime and is the
    /// second identifier synthesized into SQL, so it gets its own gate.
    pub fn matrix_content_table(&self, name: &str) -> DbResult<String> {
        if MATRIX_CONTENT_RE.is_match(name) {
            Ok(self.table(name))
        } else {
            Err(DbError::UnsafeTableName(name.to_string()))
        }
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a matrix-content table name without qualifying it.
pub fn is_safe_matrix_content_table(name: &str) -> bool {
    MATRIX_CONTENT_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for ok in ["a", "visityarra", "t_1", "z9", "x".repeat(64).as_str()] {
            assert!(Tenant::parse(ok).is_ok(), "{ok} should parse");
        }
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        for bad in [
            "",
            "1abc",
            "Tenant",
            "te-nant",
            "te nant",
            "t;drop",
            "te.nant",
            "x".repeat(65).as_str(),
        ] {
            assert!(Tenant::parse(bad).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn qualifies_tables() {
        let t = Tenant::parse("visityarra").unwrap();
        assert_eq!(t.table("craft_elements"), "visityarra.craft_elements");
    }

    #[test]
    fn matrix_content_gate() {
        let t = Tenant::parse("t1").unwrap();
        assert_eq!(
            t.matrix_content_table("craft_matrixcontent_pagebuilder")
                .unwrap(),
            "t1.craft_matrixcontent_pagebuilder"
        );
        assert!(t.matrix_content_table("craft_content").is_err());
        assert!(t
            .matrix_content_table("craft_matrixcontent_x; drop table y")
            .is_err());
        assert!(t.matrix_content_table("craft_matrixcontent_").is_err());
    }
}
