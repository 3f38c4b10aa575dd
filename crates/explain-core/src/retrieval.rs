//! Domain- and tenant-aware code retrieval.
//!
//! Retrieval never fails the request: any transport problem collapses to
//! an empty context block and the generator carries on without it.

use explain_ai::{SearchClient, SearchOptions, SearchResponse};
use explain_db::Tenant;
use tracing::warn;

use crate::intent::{ParsedIntent, QuestionDomain};

/// Build the retrieval query: the raw question, a domain descriptor, and
/// a theme hint so embeddings prefer the tenant's own templates.
pub fn build_query(intent: &ParsedIntent, tenant: Option<&Tenant>) -> String {
    let mut query = intent.raw_question.clone();
    match intent.domain {
        QuestionDomain::AtdwImport => {
            query.push_str(" ATDW product import eligibility and category mapping");
        }
        QuestionDomain::PageComponent | QuestionDomain::General => {
            query.push_str(&format!(
                " How does the {} component decide what to display",
                intent.component_type
            ));
        }
    }
    if let Some(tenant) = tenant {
        query.push_str(&format!(" (theme: {tenant})"));
    }
    query
}

/// Join search hits into one prompt-ready text blob.
pub fn format_context(response: &SearchResponse) -> String {
    let mut sections = Vec::new();
    for hit in &response.data {
        let chunks: Vec<&str> = hit.content.iter().map(|c| c.text.as_str()).collect();
        if chunks.is_empty() {
            continue;
        }
        sections.push(format!(
            "--- {} (score: {:.2}) ---\n{}",
            hit.filename,
            hit.score,
            chunks.join("\n")
        ));
    }
    sections.join("\n\n")
}

/// Retrieve code context for an intent. Returns an empty string on any
/// failure.
pub async fn retrieve_context(
    search: &SearchClient,
    intent: &ParsedIntent,
    tenant: Option<&Tenant>,
) -> String {
    let query = build_query(intent, tenant);
    match search.search(&query, &SearchOptions::default()).await {
        Ok(response) => format_context(&response),
        Err(e) => {
            warn!(error = %e, "Code retrieval failed; continuing without context");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::ParsedIntent;
    use explain_ai::SearchResponse;

    #[test]
    fn query_carries_domain_and_theme() {
        let mut intent = ParsedIntent::fallback(
            "Why isn't Yarra Lodge on /stay?",
            Some("/stay"),
            QuestionDomain::PageComponent,
        );
        intent.component_type = "products".to_string();
        let tenant = Tenant::parse("visityarra").unwrap();

        let query = build_query(&intent, Some(&tenant));
        assert!(query.starts_with("Why isn't Yarra Lodge on /stay?"));
        assert!(query.contains("products component"));
        assert!(query.contains("theme: visityarra"));

        intent.domain = QuestionDomain::AtdwImport;
        let query = build_query(&intent, None);
        assert!(query.contains("ATDW product import"));
        assert!(!query.contains("theme:"));
    }

    #[test]
    fn context_blob_formatting() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"data":[
                {"filename":"a.twig","score":0.8123,"content":[{"text":"one"},{"text":"two"}]},
                {"filename":"empty.twig","score":0.5,"content":[]},
                {"filename":"b.php","score":0.35,"content":[{"text":"three"}]}
            ]}"#,
        )
        .unwrap();

        let blob = format_context(&response);
        assert!(blob.contains("--- a.twig (score: 0.81) ---\none\ntwo"));
        assert!(blob.contains("--- b.php (score: 0.35) ---\nthree"));
        assert!(!blob.contains("empty.twig"));
    }
}
