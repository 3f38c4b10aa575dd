//! Intent parsing: free-form question + URL hints → typed intent.
//!
//! Deterministic pre-processing runs first and outranks the model: an
//! admin URL names a product entry exactly, so its domain and name are
//! not up for debate. The model call classifies the rest; a rule-based
//! regex stands in when the model output cannot be used.

pub mod model;

use explain_ai::{ChatMessage, LlmClient};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub use model::{ModelIntent, ParsedIntent, QuestionDomain, QuestionType};

static ADMIN_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/admin/entries/products/(\d+)-(.+)$").expect("admin url regex"));

static ATDW_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\batdw\b|\batlas\b|\bimport(?:ed)?\b.*\bproduct\b|\bproduct\b.*\bimport")
        .expect("atdw hint regex")
});

const CLASSIFY_MAX_TOKENS: u32 = 256;
const CLASSIFY_TEMPERATURE: f32 = 0.1;

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You classify questions from website managers of a tourism website.

Return ONLY a JSON object, no prose, with these keys:
- "domain": one of "page_component" (about what shows on a website page), "atdw_import" (about ATDW / Atlas product imports), "general"
- "pageUri": the page path mentioned, if any (e.g. "/stay")
- "pageName": the page name mentioned, if any
- "componentType": the kind of page section asked about, lower-case (default "products")
- "productNames": array of product/business names mentioned
- "atdwProductId": an ATDW product id if one is quoted
- "questionType": one of "why_included", "why_excluded", "what_shows", "why_order", "general"

Examples:
{"domain":"page_component","pageUri":"/stay","componentType":"products","productNames":["Yarra Lodge"],"questionType":"why_excluded"}
{"domain":"atdw_import","productNames":["Wycheproof Caravan Park"],"questionType":"why_excluded"}"#;

/// A deterministic hit from an admin entry URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUrlHit {
    pub entry_id: i64,
    pub name: String,
}

/// Recognise `/admin/entries/products/{id}-{slug}` and derive a
/// title-cased product name from the slug.
pub fn admin_url_override(uri: &str) -> Option<AdminUrlHit> {
    let caps = ADMIN_URL_RE.captures(uri)?;
    let entry_id: i64 = caps.get(1)?.as_str().parse().ok()?;
    let name = title_case_slug(caps.get(2)?.as_str());
    Some(AdminUrlHit { entry_id, name })
}

/// `wycheproof-caravan-park` → `Wycheproof Caravan Park`.
pub fn title_case_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The rule-based classifier used when the model is unavailable.
pub fn fallback_domain(question: &str) -> QuestionDomain {
    if ATDW_HINT_RE.is_match(question) {
        QuestionDomain::AtdwImport
    } else {
        QuestionDomain::PageComponent
    }
}

/// Extract the first balanced JSON object from model output, tolerating
/// prose or code fences around it.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a question into a typed intent. Never fails: every failure mode
/// lands on the rule-based classifier.
pub async fn parse_intent(
    llm: &LlmClient,
    question: &str,
    page_uri: Option<&str>,
) -> ParsedIntent {
    let admin = page_uri.and_then(admin_url_override);

    let model_intent = classify_with_model(llm, question).await.unwrap_or_else(|| {
        debug!("Falling back to rule-based intent classification");
        ModelIntent::default()
    });

    merge_intent(question, page_uri, admin, model_intent)
}

async fn classify_with_model(llm: &LlmClient, question: &str) -> Option<ModelIntent> {
    let messages = [ChatMessage::user(question)];
    let response = llm
        .complete(
            CLASSIFY_SYSTEM_PROMPT,
            &messages,
            CLASSIFY_MAX_TOKENS,
            CLASSIFY_TEMPERATURE,
        )
        .await;

    let text = match response {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Intent classification call failed");
            return None;
        }
    };

    let json = extract_json_object(&text)?;
    match serde_json::from_str::<ModelIntent>(json) {
        Ok(intent) => Some(intent),
        Err(e) => {
            warn!(error = %e, "Intent classification returned unusable JSON");
            None
        }
    }
}

/// Deterministic merge of the three sources. The admin URL wins the
/// domain; admin-derived names come first; the request's uri hint beats
/// the model's guess.
pub fn merge_intent(
    question: &str,
    page_uri: Option<&str>,
    admin: Option<AdminUrlHit>,
    model: ModelIntent,
) -> ParsedIntent {
    let domain = if admin.is_some() {
        QuestionDomain::AtdwImport
    } else {
        model.domain.unwrap_or_else(|| fallback_domain(question))
    };

    let mut product_names: Vec<String> = Vec::new();
    if let Some(hit) = &admin {
        product_names.push(hit.name.clone());
    }
    for name in model.product_names {
        let duplicate = product_names
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(&name));
        if !duplicate && !name.trim().is_empty() {
            product_names.push(name);
        }
    }

    ParsedIntent {
        domain,
        page_uri: page_uri.map(str::to_string).or(model.page_uri),
        page_name: model.page_name,
        component_type: model
            .component_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("products")
            .to_lowercase(),
        product_names,
        atdw_product_id: model.atdw_product_id,
        question_type: model.question_type.unwrap_or(QuestionType::General),
        raw_question: question.to_string(),
    }
}
