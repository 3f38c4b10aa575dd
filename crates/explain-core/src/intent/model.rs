//! Parsed-intent model.

use serde::{Deserialize, Serialize};

/// Which half of the platform the question is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionDomain {
    PageComponent,
    AtdwImport,
    General,
}

/// What kind of answer the question wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    WhyIncluded,
    WhyExcluded,
    WhatShows,
    WhyOrder,
    General,
}

/// Structured reading of a free-form question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIntent {
    pub domain: QuestionDomain,
    pub page_uri: Option<String>,
    pub page_name: Option<String>,
    /// Lower-cased component handle; defaults to `products`.
    pub component_type: String,
    pub product_names: Vec<String>,
    pub atdw_product_id: Option<String>,
    pub question_type: QuestionType,
    pub raw_question: String,
}

impl ParsedIntent {
    /// A conservative default used when classification yields nothing.
    pub fn fallback(question: &str, page_uri: Option<&str>, domain: QuestionDomain) -> Self {
        Self {
            domain,
            page_uri: page_uri.map(str::to_string),
            page_name: None,
            component_type: "products".to_string(),
            product_names: Vec::new(),
            atdw_product_id: None,
            question_type: QuestionType::General,
            raw_question: question.to_string(),
        }
    }
}

/// What the classification model is allowed to return. Everything is
/// optional; merging fills the gaps deterministically.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelIntent {
    pub domain: Option<QuestionDomain>,
    pub page_uri: Option<String>,
    pub page_name: Option<String>,
    pub component_type: Option<String>,
    #[serde(default)]
    pub product_names: Vec<String>,
    pub atdw_product_id: Option<String>,
    pub question_type: Option<QuestionType>,
}
