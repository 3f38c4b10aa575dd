//! Single-purpose, parameterised SQL functions.
//!
//! Each function takes the pool plus a validated [`crate::Tenant`] and
//! returns typed rows. Identifiers are never interpolated except through
//! the tenant/table gates; values always go through bound parameters.

pub mod categories;
pub mod imports;
pub mod pages;
pub mod products;
pub mod relations;
pub mod schema;
pub mod search;

use rusqlite::types::Value as SqlValue;

/// Build a `?1, ?2, …` placeholder list for a dynamic IN clause.
pub(crate) fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parameter vector for an id list.
pub(crate) fn id_params(ids: &[i64]) -> Vec<SqlValue> {
    ids.iter().map(|id| SqlValue::Integer(*id)).collect()
}

/// Strip characters that would let user text escape a LIKE pattern.
pub(crate) fn sanitize_like(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '"' | '%' | '\\'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(1), "?1");
        assert_eq!(placeholders(3), "?1, ?2, ?3");
    }

    #[test]
    fn like_sanitizer_strips_metacharacters() {
        assert_eq!(sanitize_like(r#"Ya%rra "Lodge"\"#), "Yarra Lodge");
        assert_eq!(sanitize_like("plain name"), "plain name");
    }
}
