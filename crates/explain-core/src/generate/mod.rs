//! Prompt composition and explanation generation.
//!
//! The generator is the only non-deterministic stage. Everything it is
//! fed (config, trace, code context, history) is prepared here with
//! deterministic formatting and truncation, and a deterministic fallback
//! stands in whenever the model cannot.

use explain_ai::{ChatMessage, LlmClient};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use tracing::warn;

use crate::component::ComponentConfig;
use crate::history;
use crate::import::AtdwImportConfig;
use crate::intent::{ParsedIntent, QuestionDomain};
use crate::trace::TraceStep;

/// Token cap for explanation calls; the persona keeps answers to a few
/// short paragraphs anyway.
const GENERATE_MAX_TOKENS: u32 = 1024;
const GENERATE_TEMPERATURE: f32 = 0.3;

/// Detail arrays longer than this render as `[N items]`.
const DETAIL_ARRAY_CAP: usize = 10;
/// Serialised detail payloads longer than this are dropped.
const DETAIL_PAYLOAD_CAP: usize = 400;

const PAGE_PERSONA: &str = r#"You are a friendly helper for people who manage a tourism website. They are not technical.

You are given the settings of a page section and a step-by-step account of how the website chose what to show. Explain what happened in plain language.

Rules:
- Talk about "component settings", "categories", "regions" and "the list of products". Never mention files, functions, queries, internal step names, or raw numeric ids.
- If the evidence does not answer the question, say what you'd need to know and ask one clarifying question.
- Keep it to two or three short paragraphs."#;

const IMPORT_PERSONA: &str = r#"You are a friendly helper for people who manage a tourism website. They are not technical.

You are given the facts recorded about a product listing from the ATDW (the national tourism database) and how the website's import treated it. Explain what happened in plain language.

Rules:
- Talk about "the listing", "the import", "regions" and "categories". Never mention files, functions, queries, internal step names, or raw numeric ids.
- If the evidence does not answer the question, say what you'd need to know and ask one clarifying question.
- Keep it to two or three short paragraphs."#;

/// The joined output of the data-collection stage.
pub enum CollectedData {
    Component {
        config: ComponentConfig,
        trace: Vec<TraceStep>,
    },
    Import {
        config: AtdwImportConfig,
        trace: Vec<TraceStep>,
    },
}

impl CollectedData {
    pub fn trace(&self) -> &[TraceStep] {
        match self {
            Self::Component { trace, .. } => trace,
            Self::Import { trace, .. } => trace,
        }
    }

    pub fn config_json(&self) -> Value {
        match self {
            Self::Component { config, .. } => serde_json::to_value(config).unwrap_or(Value::Null),
            Self::Import { config, .. } => serde_json::to_value(config).unwrap_or(Value::Null),
        }
    }
}

/// Persona for the intent's domain.
pub fn system_prompt(domain: QuestionDomain) -> &'static str {
    match domain {
        QuestionDomain::AtdwImport => IMPORT_PERSONA,
        QuestionDomain::PageComponent | QuestionDomain::General => PAGE_PERSONA,
    }
}

/// Render one trace for the prompt, with human labels and truncated
/// details.
pub fn format_trace(trace: &[TraceStep]) -> String {
    let mut lines = Vec::new();
    for step in trace {
        let mut line = format!("- {}: {}", step.step.label(), step.description);
        match step.target_present {
            Some(true) => line.push_str(" [the product in question is here]"),
            Some(false) => line.push_str(" [the product in question is NOT here]"),
            None => {}
        }
        if let Some(details) = format_details(&step.details) {
            line.push_str(&format!(" ({details})"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Truncate a step's detail map per the prompt rules. `None` means the
/// payload was too large to include at all.
fn format_details(details: &serde_json::Map<String, Value>) -> Option<String> {
    if details.is_empty() {
        return None;
    }
    let mut compact = serde_json::Map::new();
    for (key, value) in details {
        let rendered = match value {
            Value::Array(items) if items.len() > DETAIL_ARRAY_CAP => {
                Value::String(format!("[{} items]", items.len()))
            }
            other => other.clone(),
        };
        compact.insert(key.clone(), rendered);
    }
    let payload = serde_json::to_string(&compact).ok()?;
    if payload.len() > DETAIL_PAYLOAD_CAP {
        return None;
    }
    Some(payload)
}

/// Friendly rendering of a products-component configuration.
pub fn format_component_config(config: &ComponentConfig) -> String {
    let list = |refs: &[crate::component::RelatedRef]| -> String {
        if refs.is_empty() {
            "none".to_string()
        } else {
            refs.iter()
                .map(|r| r.title.clone())
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    let mut lines = vec![
        format!("Categories: {}", list(&config.categories)),
        format!("Regions: {}", list(&config.regions)),
        format!("Tiers: {}", list(&config.tiers)),
        format!("Taxonomy: {}", list(&config.taxonomy)),
        format!("Hand-picked products: {}", list(&config.explicit_products)),
        format!("Excluded products: {}", list(&config.exclude_products)),
        format!("Display limit: {}", config.limit),
        format!("Ordering: {:?}", config.order),
    ];
    if let Some(style) = &config.style {
        lines.push(format!("Style: {style}"));
    }
    if let Some(layout) = &config.layout {
        lines.push(format!("Layout: {layout}"));
    }
    lines.join("\n")
}

/// Friendly rendering of an import snapshot.
pub fn format_import_config(config: &AtdwImportConfig) -> String {
    let mut lines = Vec::new();
    if let Some(name) = &config.product_name {
        lines.push(format!("Listing: {name}"));
    }
    if let Some(category) = &config.category {
        lines.push(format!("ATDW category: {category}"));
    }
    if let Some(status) = &config.atdw_status {
        lines.push(format!("ATDW status: {status}"));
    }
    lines.push(format!(
        "Imported: {}",
        if config.imported { "yes" } else { "no" }
    ));
    lines.push(format!(
        "Has a website listing: {}",
        if config.has_entry { "yes" } else { "no" }
    ));
    if let Some(postcode) = &config.postcode {
        let location = match &config.city {
            Some(city) => format!("{city} {postcode}"),
            None => postcode.clone(),
        };
        lines.push(format!("Location: {location}"));
    }
    if !config.matching_regions.is_empty() {
        lines.push(format!("Inside regions: {}", config.matching_regions.join(", ")));
    }
    if !config.mapped_categories.is_empty() {
        lines.push(format!(
            "Maps to website categories: {}",
            config.mapped_categories.join(", ")
        ));
    }
    if let Some(reason) = &config.reason {
        lines.push(format!("Recorded note: {reason}"));
    }
    if let Some(updated) = &config.last_updated {
        lines.push(format!("Last updated: {updated}"));
    }
    lines.join("\n")
}

/// Pack everything the model needs into the user prompt.
pub fn build_user_prompt(
    intent: &ParsedIntent,
    data: &CollectedData,
    targets: &[i64],
    code_context: &str,
    chat_history: &[ChatMessage],
) -> String {
    let mut sections = vec![format!("Question: {}", intent.raw_question)];

    if let Some(uri) = &intent.page_uri {
        sections.push(format!("Page: {uri}"));
    }
    if !intent.product_names.is_empty() {
        sections.push(format!(
            "Product(s) asked about: {}",
            intent.product_names.join(", ")
        ));
    }
    if !targets.is_empty() {
        let ids: Vec<String> = targets.iter().map(i64::to_string).collect();
        sections.push(format!(
            "Those names matched product record id(s): {} (for your reference only; never show ids)",
            ids.join(", ")
        ));
    }

    let config_text = match data {
        CollectedData::Component { config, .. } => format_component_config(config),
        CollectedData::Import { config, .. } => format_import_config(config),
    };
    sections.push(format!("Current settings:\n{config_text}"));
    sections.push(format!(
        "What the website worked out, step by step:\n{}",
        format_trace(data.trace())
    ));

    if !code_context.is_empty() {
        sections.push(format!(
            "How the platform works (internal notes, do not quote):\n{code_context}"
        ));
    }

    let clamped = history::clamp_history(chat_history);
    if !clamped.is_empty() {
        let rendered: Vec<String> = clamped
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect();
        sections.push(format!("Earlier conversation:\n{}", rendered.join("\n")));
    }

    sections.join("\n\n")
}

/// Deterministic prose used when the model is unavailable: filters,
/// final count, and the first step where the target went missing.
pub fn fallback_explanation(intent: &ParsedIntent, data: &CollectedData) -> String {
    match data {
        CollectedData::Component { config, trace } => {
            let mut filters = Vec::new();
            if !config.categories.is_empty() {
                filters.push("categories");
            }
            if !config.regions.is_empty() {
                filters.push("regions");
            }
            if !config.tiers.is_empty() {
                filters.push("tiers");
            }
            if !config.taxonomy.is_empty() {
                filters.push("taxonomy");
            }

            let mut text = if filters.is_empty() {
                "This section shows a hand-picked list of products.".to_string()
            } else {
                format!("This section filters products by {}.", filters.join(", "))
            };

            if let Some(last) = trace.last() {
                text.push_str(&format!(" Right now {} product(s) make the cut.", last.count));
            }
            if let Some(step) = trace.iter().find(|s| s.target_present == Some(false)) {
                text.push_str(&format!(
                    " The product you asked about drops out at: {}.",
                    step.step.label()
                ));
            } else if intent.product_names.is_empty() && trace.len() <= 1 {
                text.push_str(" Could you tell me which page and product you mean?");
            }
            text
        }
        CollectedData::Import { config, trace } => {
            if config.product_id.is_none() {
                return "I couldn't find an ATDW listing with that name or id. \
                        Could you check the spelling, or share the listing's ATDW id?"
                    .to_string();
            }
            let mut text = format!(
                "The listing {} was {}.",
                config.product_name.as_deref().unwrap_or("you asked about"),
                if config.imported {
                    "imported to the website"
                } else {
                    "not imported"
                }
            );
            if let Some(reason) = &config.reason {
                text.push_str(&format!(" The import noted: {reason}."));
            } else if let Some(step) = trace.iter().find(|s| s.target_present == Some(false)) {
                text.push_str(&format!(" It fell short at: {}.", step.step.label()));
            }
            text
        }
    }
}

/// Buffered generation with the deterministic fallback.
pub async fn generate(
    llm: &LlmClient,
    intent: &ParsedIntent,
    data: &CollectedData,
    targets: &[i64],
    code_context: &str,
    chat_history: &[ChatMessage],
) -> String {
    let user_prompt = build_user_prompt(intent, data, targets, code_context, chat_history);
    let messages = [ChatMessage::user(user_prompt)];

    match llm
        .complete(
            system_prompt(intent.domain),
            &messages,
            GENERATE_MAX_TOKENS,
            GENERATE_TEMPERATURE,
        )
        .await
    {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("Model returned empty explanation; using fallback");
            fallback_explanation(intent, data)
        }
        Err(e) => {
            warn!(error = %e, "Generation failed; using fallback");
            fallback_explanation(intent, data)
        }
    }
}

/// Streaming generation. When the stream cannot even start, the caller
/// still gets one chunk: the deterministic fallback.
pub async fn generate_stream(
    llm: &LlmClient,
    intent: &ParsedIntent,
    data: &CollectedData,
    targets: &[i64],
    code_context: &str,
    chat_history: &[ChatMessage],
) -> BoxStream<'static, anyhow::Result<String>> {
    let user_prompt = build_user_prompt(intent, data, targets, code_context, chat_history);
    let messages = [ChatMessage::user(user_prompt)];

    match llm
        .stream_complete(
            system_prompt(intent.domain),
            &messages,
            GENERATE_MAX_TOKENS,
            GENERATE_TEMPERATURE,
        )
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Streaming generation failed to start; using fallback");
            let fallback = fallback_explanation(intent, data);
            futures::stream::once(async move { Ok(fallback) }).boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::RelatedRef;
    use crate::trace::{TraceStep, TraceStepName};
    use serde_json::json;

    fn component_data() -> CollectedData {
        let config = ComponentConfig {
            regions: vec![RelatedRef {
                id: 310,
                title: "Valley".to_string(),
            }],
            limit: 6,
            ..ComponentConfig::default()
        };
        let trace = vec![
            TraceStep::readout(TraceStepName::ResolveRegions, "1 regions selected"),
            TraceStep::with_products(
                TraceStepName::RegionToProducts,
                "2 products found",
                vec![401, 402],
                &[999],
            ),
            TraceStep::with_products(TraceStepName::Limit, "showing 2", vec![401, 402], &[999]),
        ];
        CollectedData::Component { config, trace }
    }

    #[test]
    fn trace_rendering_uses_labels_not_step_names() {
        let data = component_data();
        let rendered = format_trace(data.trace());
        assert!(rendered.contains("Region selection"));
        assert!(rendered.contains("Products in the selected regions"));
        assert!(rendered.contains("NOT here"));
        assert!(!rendered.contains("region_to_products"));
    }

    #[test]
    fn oversized_detail_arrays_collapse() {
        let step = TraceStep::readout(TraceStepName::BlockConfig, "settings")
            .detail("many", json!((0..25).collect::<Vec<i64>>()))
            .detail("few", json!([1, 2]));
        let rendered = format_trace(&[step]);
        assert!(rendered.contains("[25 items]"));
        assert!(rendered.contains("\"few\":[1,2]"));
    }

    #[test]
    fn oversized_detail_payloads_drop() {
        let step = TraceStep::readout(TraceStepName::BlockConfig, "settings")
            .detail("huge", json!("x".repeat(500)));
        let rendered = format_trace(&[step]);
        assert!(!rendered.contains("xxxx"));
        assert!(rendered.contains("Component settings: settings"));
    }

    #[test]
    fn user_prompt_packs_sections() {
        let mut intent = ParsedIntent::fallback(
            "Why isn't 'Yarra Lodge' on /stay?",
            Some("/stay"),
            crate::intent::QuestionDomain::PageComponent,
        );
        intent.product_names = vec!["Yarra Lodge".to_string()];
        let history = vec![ChatMessage::user("earlier question")];

        let prompt = build_user_prompt(&intent, &component_data(), &[999], "code ctx", &history);
        assert!(prompt.contains("Question: Why isn't 'Yarra Lodge' on /stay?"));
        assert!(prompt.contains("Page: /stay"));
        assert!(prompt.contains("Current settings:"));
        assert!(prompt.contains("Display limit: 6"));
        assert!(prompt.contains("code ctx"));
        assert!(prompt.contains("Earlier conversation:"));
    }

    #[test]
    fn fallback_names_the_dropout_step() {
        let intent = ParsedIntent::fallback(
            "why?",
            None,
            crate::intent::QuestionDomain::PageComponent,
        );
        let text = fallback_explanation(&intent, &component_data());
        assert!(text.contains("regions"));
        assert!(text.contains("2 product(s)"));
        assert!(text.contains("Products in the selected regions"));
    }

    #[test]
    fn fallback_for_missing_import_record_asks_for_details() {
        let intent =
            ParsedIntent::fallback("why?", None, crate::intent::QuestionDomain::AtdwImport);
        let data = CollectedData::Import {
            config: AtdwImportConfig::default(),
            trace: vec![TraceStep::readout(TraceStepName::AtdwLookup, "no match")
                .present(Some(false))],
        };
        let text = fallback_explanation(&intent, &data);
        assert!(text.contains("couldn't find"));
        assert!(text.ends_with('?'));
    }

    #[test]
    fn personas_differ_by_domain() {
        assert!(system_prompt(QuestionDomain::AtdwImport).contains("ATDW"));
        assert!(system_prompt(QuestionDomain::PageComponent).contains("page section"));
    }
}
