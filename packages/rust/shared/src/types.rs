//! Stage contracts exchanged between pipeline agents.
//!
//! Each record is produced by exactly one stage and validated by the
//! orchestrator before it is handed downstream. `validate()` never coerces:
//! a breach is an [`ExplainerError::Contract`] naming the producing stage.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ExplainerError, Result};

/// Upper bound on `QueryAnalysis::keywords`.
pub const MAX_KEYWORDS: usize = 8;

/// Minimum number of best-practice bullets in a [`FinalAnswer`].
pub const MIN_BEST_PRACTICES: usize = 4;

/// Minimum number of line-by-line notes in a [`FinalAnswer`].
pub const MIN_LINE_BY_LINE: usize = 6;

// ---------------------------------------------------------------------------
// Topic aliases
// ---------------------------------------------------------------------------

/// Raw topic spellings and the canonical topic they collapse to.
/// No canonical value appears on the left, so aliasing is idempotent.
pub const TOPIC_ALIASES: &[(&str, &str)] = &[
    ("dependencies", "dependency_injection"),
    ("dependency injection", "dependency_injection"),
    ("depends", "dependency_injection"),
    ("di", "dependency_injection"),
    ("auth", "authentication"),
    ("jwt", "authentication"),
    ("oauth", "authentication"),
    ("oauth2", "authentication"),
    ("rest", "rest_api"),
    ("api", "rest_api"),
    ("http", "rest_api"),
    ("web socket", "websocket"),
    ("ws", "websocket"),
    ("db", "database"),
    ("sql", "database"),
    ("orm", "database"),
    ("sqlalchemy", "database"),
    ("background task", "background_tasks"),
    ("background tasks", "background_tasks"),
    ("background-tasks", "background_tasks"),
];

/// Map a topic through [`TOPIC_ALIASES`]. Unknown spellings pass through.
pub fn canonical_topic(topic: &str) -> &str {
    TOPIC_ALIASES
        .iter()
        .find(|(alias, _)| *alias == topic)
        .map_or(topic, |&(_, canonical)| canonical)
}

// ---------------------------------------------------------------------------
// Language / Framework
// ---------------------------------------------------------------------------

/// Programming language of the question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Java,
    #[default]
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Java => "java",
            Self::Unknown => "unknown",
        }
    }

    /// Parse model output leniently; anything outside the allow-list is `Unknown`.
    pub fn from_model(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "python" => Self::Python,
            "javascript" => Self::Javascript,
            "java" => Self::Java,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Framework the question is about. Always a single value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Fastapi,
    Django,
    Flask,
    React,
    #[default]
    Unknown,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fastapi => "fastapi",
            Self::Django => "django",
            Self::Flask => "flask",
            Self::React => "react",
            Self::Unknown => "unknown",
        }
    }

    /// Parse model output leniently. A delimited list such as
    /// `fastapi|django` is reduced to its first element.
    pub fn from_model(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let first = lowered.split('|').next().unwrap_or_default().trim();
        match first {
            "fastapi" => Self::Fastapi,
            "django" => Self::Django,
            "flask" => Self::Flask,
            "react" => Self::React,
            _ => Self::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// QueryAnalysis
// ---------------------------------------------------------------------------

/// Stage-1 output: what the question is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub language: Language,
    pub framework: Framework,
    /// Canonical topic (already mapped through [`TOPIC_ALIASES`]).
    pub topic: String,
    #[serde(default)]
    pub subtopic: Option<String>,
    /// Lowercase search keywords, first occurrence wins, at most [`MAX_KEYWORDS`].
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for QueryAnalysis {
    /// Analysis used for an empty question.
    fn default() -> Self {
        Self {
            language: Language::Python,
            framework: Framework::Unknown,
            topic: "unknown".into(),
            subtopic: None,
            keywords: Vec::new(),
        }
    }
}

impl QueryAnalysis {
    pub const STAGE: &'static str = "query_analyzer";

    pub fn validate(&self) -> Result<()> {
        let breach = |msg: String| Err(ExplainerError::contract(Self::STAGE, msg));

        if self.topic.trim().is_empty() {
            return breach("topic is empty".into());
        }
        if canonical_topic(&self.topic) != self.topic {
            return breach(format!("topic '{}' is not canonical", self.topic));
        }
        if self.keywords.len() > MAX_KEYWORDS {
            return breach(format!("{} keywords (max {MAX_KEYWORDS})", self.keywords.len()));
        }
        let mut seen = HashSet::new();
        for kw in &self.keywords {
            if kw.trim().is_empty() {
                return breach("blank keyword".into());
            }
            if *kw != kw.to_lowercase() {
                return breach(format!("keyword '{kw}' is not lowercase"));
            }
            if !seen.insert(kw.as_str()) {
                return breach(format!("duplicate keyword '{kw}'"));
            }
        }
        if self.subtopic.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return breach("subtopic is present but blank".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DocumentationResult
// ---------------------------------------------------------------------------

/// One retrieved documentation chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnippet {
    pub source: String,
    pub text: String,
    /// Similarity in `[0, 1]`; 0 when the backend score was unusable.
    pub relevance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationMeta {
    /// Query actually sent to the similarity search.
    pub query: String,
    /// Number of snippets kept.
    pub top_k: usize,
    /// Backend label.
    pub source: String,
}

/// Stage-2a output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationResult {
    #[serde(default)]
    pub snippets: Vec<DocSnippet>,
    #[serde(default)]
    pub meta: DocumentationMeta,
}

impl DocumentationResult {
    pub const STAGE: &'static str = "doc_reader";

    pub fn validate(&self) -> Result<()> {
        for (i, snippet) in self.snippets.iter().enumerate() {
            if snippet.text.trim().is_empty() {
                return Err(ExplainerError::contract(
                    Self::STAGE,
                    format!("snippet {i} has empty text"),
                ));
            }
            if !snippet.relevance.is_finite() || !(0.0..=1.0).contains(&snippet.relevance) {
                return Err(ExplainerError::contract(
                    Self::STAGE,
                    format!("snippet {i} relevance {} outside [0, 1]", snippet.relevance),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ExampleFinderResult
// ---------------------------------------------------------------------------

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExampleMeta {
    pub query: String,
    pub provider: String,
    /// Non-empty result URLs, in result order.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Stage-2b output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExampleFinderResult {
    #[serde(default)]
    pub results: Vec<WebResult>,
    /// Best-effort code candidate pulled from the raw snippets.
    #[serde(default)]
    pub code_example: String,
    #[serde(default)]
    pub meta: ExampleMeta,
}

impl ExampleFinderResult {
    pub const STAGE: &'static str = "example_finder";

    pub fn validate(&self) -> Result<()> {
        if self.meta.urls.iter().any(|u| u.trim().is_empty()) {
            return Err(ExplainerError::contract(Self::STAGE, "meta.urls contains an empty URL"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tool contracts
// ---------------------------------------------------------------------------

/// Syntax check of a code candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// 1-based line of the first syntax error.
    #[serde(default)]
    pub line: Option<usize>,
    /// 1-based column of the first syntax error.
    #[serde(default)]
    pub offset: Option<usize>,
}

impl CodeValidationResult {
    pub const STAGE: &'static str = "code_validator";

    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn invalid(error: impl Into<String>, line: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            line,
            offset,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.valid && self.error.is_some() {
            return Err(ExplainerError::contract(Self::STAGE, "valid result carries an error"));
        }
        Ok(())
    }
}

/// Cyclomatic complexity of one function or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityBlock {
    pub name: String,
    pub complexity: u32,
    pub line: usize,
}

/// Complexity summary. Every scalar is optional: the analyzer may be
/// unavailable or skipped entirely (the default value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityResult {
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub avg_complexity: Option<f64>,
    #[serde(default)]
    pub max_complexity: Option<u32>,
    #[serde(default)]
    pub blocks: Vec<ComplexityBlock>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ComplexityResult {
    pub const STAGE: &'static str = "complexity_analyzer";

    pub fn validate(&self) -> Result<()> {
        if let (Some(avg), Some(max)) = (self.avg_complexity, self.max_complexity) {
            if !avg.is_finite() || avg > f64::from(max) {
                return Err(ExplainerError::contract(
                    Self::STAGE,
                    format!("avg_complexity {avg} exceeds max_complexity {max}"),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FinalAnswer
// ---------------------------------------------------------------------------

/// Metadata attached to the final answer. Extra model-provided keys are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerMeta {
    pub framework: String,
    pub topic: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Terminal, externally visible contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub explanation: String,
    pub code_example: String,
    pub line_by_line: Vec<String>,
    pub best_practices: Vec<String>,
    pub sources: Vec<String>,
    pub meta: AnswerMeta,
}

impl FinalAnswer {
    pub const STAGE: &'static str = "code_explainer";

    pub fn validate(&self) -> Result<()> {
        let breach = |msg: String| Err(ExplainerError::contract(Self::STAGE, msg));

        if self.explanation.trim().is_empty() {
            return breach("explanation is empty".into());
        }
        if self.best_practices.len() < MIN_BEST_PRACTICES {
            return breach(format!(
                "{} best practices (min {MIN_BEST_PRACTICES})",
                self.best_practices.len()
            ));
        }
        if self.line_by_line.len() < MIN_LINE_BY_LINE {
            return breach(format!(
                "{} line-by-line notes (min {MIN_LINE_BY_LINE})",
                self.line_by_line.len()
            ));
        }
        if self.sources.is_empty() {
            return breach("no sources".into());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.sources.iter().find(|s| !seen.insert(s.as_str())) {
            return breach(format!("duplicate source '{dup}'"));
        }
        if self.meta.framework.trim().is_empty() || self.meta.topic.trim().is_empty() {
            return breach("meta.framework and meta.topic must be present".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer() -> FinalAnswer {
        FinalAnswer {
            explanation: "WebSockets keep a connection open.".into(),
            code_example: "print('hi')".into(),
            line_by_line: (1..=6).map(|i| format!("step {i}")).collect(),
            best_practices: (1..=4).map(|i| format!("practice {i}")).collect(),
            sources: vec!["https://fastapi.tiangolo.com".into()],
            meta: AnswerMeta {
                framework: "fastapi".into(),
                topic: "websocket".into(),
                extra: serde_json::Map::new(),
            },
        }
    }

    #[test]
    fn aliasing_is_idempotent() {
        for (alias, canonical) in TOPIC_ALIASES {
            let once = canonical_topic(alias);
            assert_eq!(once, *canonical);
            assert_eq!(canonical_topic(once), once, "{alias} is not a fixed point");
        }
        assert_eq!(canonical_topic("routing"), "routing");
    }

    #[test]
    fn framework_from_model_reduces_lists() {
        assert_eq!(
            Framework::from_model("FastAPI|django|flask"),
            Framework::Fastapi
        );
        assert_eq!(Framework::from_model(" Django "), Framework::Django);
        assert_eq!(Framework::from_model("express"), Framework::Unknown);
        assert_eq!(Framework::from_model(""), Framework::Unknown);
        assert_eq!(Language::from_model("Rust"), Language::Unknown);
    }

    #[test]
    fn analysis_serializes_lowercase_enums() {
        let qa = QueryAnalysis {
            framework: Framework::Fastapi,
            topic: "websocket".into(),
            keywords: vec!["fastapi".into(), "websocket".into()],
            ..QueryAnalysis::default()
        };
        let json = serde_json::to_value(&qa).unwrap();
        assert_eq!(json["language"], "python");
        assert_eq!(json["framework"], "fastapi");
        assert!(json["subtopic"].is_null());
        qa.validate().expect("valid analysis");
    }

    #[test]
    fn analysis_rejects_alias_and_keyword_breaches() {
        let mut qa = QueryAnalysis {
            topic: "jwt".into(),
            ..QueryAnalysis::default()
        };
        assert!(qa.validate().is_err());

        qa.topic = "authentication".into();
        qa.keywords = (0..9).map(|i| format!("k{i}")).collect();
        let err = qa.validate().unwrap_err();
        assert!(err.to_string().contains("9 keywords"));

        qa.keywords = vec!["jwt".into(), "jwt".into()];
        assert!(qa.validate().is_err());

        qa.keywords = vec!["JWT".into()];
        assert!(qa.validate().is_err());
    }

    #[test]
    fn documentation_rejects_out_of_range_relevance() {
        let mut doc = DocumentationResult {
            snippets: vec![DocSnippet {
                source: "a.md".into(),
                text: "text".into(),
                relevance: 0.4,
            }],
            meta: DocumentationMeta::default(),
        };
        doc.validate().expect("valid");
        doc.snippets[0].relevance = 1.5;
        assert!(doc.validate().is_err());
        doc.snippets[0].relevance = f64::NAN;
        assert!(doc.validate().is_err());
    }

    #[test]
    fn tool_contracts() {
        CodeValidationResult::ok().validate().expect("ok");
        let bad = CodeValidationResult {
            valid: true,
            error: Some("boom".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        ComplexityResult::default()
            .validate()
            .expect("skipped is valid");
        let cx = ComplexityResult {
            available: Some(true),
            avg_complexity: Some(3.5),
            max_complexity: Some(2),
            ..Default::default()
        };
        assert!(cx.validate().is_err());
    }

    #[test]
    fn final_answer_minimums() {
        answer().validate().expect("valid");

        let mut a = answer();
        a.best_practices.pop();
        assert!(a.validate().is_err());

        let mut a = answer();
        a.sources.push("https://fastapi.tiangolo.com".into());
        let err = a.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate source"));

        let mut a = answer();
        a.meta.topic = String::new();
        assert!(a.validate().is_err());
    }

    #[test]
    fn answer_meta_keeps_extra_keys() {
        let mut a = answer();
        a.meta
            .extra
            .insert("parse_stage".into(), serde_json::json!("primary"));
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["meta"]["parse_stage"], "primary");
        assert_eq!(json["meta"]["topic"], "websocket");

        let back: FinalAnswer = serde_json::from_value(json).unwrap();
        assert_eq!(back.meta.extra["parse_stage"], "primary");
    }
}
