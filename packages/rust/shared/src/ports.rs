//! Collaborator ports consumed by the pipeline.
//!
//! The core crate depends only on these traits. Concrete adapters live in
//! the `llm`, `retrieval`, `search` and `tools` crates and are wired together
//! by the server binary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{CodeValidationResult, ComplexityResult};

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

/// Single-shot text completion backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion. Fails with [`crate::ExplainerError::Generation`]
    /// when the backend is unreachable or rejects the request.
    async fn generate(&self, prompt: &str, model: &str, temperature: f32) -> Result<String>;
}

/// Kind of work an agent is about to ask the backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Classify,
    Explain,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Explain => "explain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningDepth {
    Shallow,
    Deep,
}

/// Routing policy mapping a task to a model identifier.
pub trait ModelSelector: Send + Sync {
    fn select_model(&self, task: TaskType, input_length: usize, depth: ReasoningDepth) -> String;
}

// ---------------------------------------------------------------------------
// Similarity search
// ---------------------------------------------------------------------------

/// One raw similarity-search hit. Backends disagree on field names, so both
/// spellings are accepted and the score is kept as an untyped JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocHit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<serde_json::Value>,
    /// 1-based rank assigned by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

#[async_trait]
pub trait DocSearch: Send + Sync {
    /// Ranked hits for `query`. An empty list is a valid answer.
    async fn search(&self, query: &str) -> Result<Vec<DocHit>>;

    /// Backend label recorded in result metadata.
    fn provider(&self) -> &str {
        "local_docs"
    }
}

// ---------------------------------------------------------------------------
// Web search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `max_results` hits. Adapters retry internally and return an
    /// empty list once their retry budget is spent.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>>;

    fn provider(&self) -> &str {
        "web"
    }
}

// ---------------------------------------------------------------------------
// Static analysis
// ---------------------------------------------------------------------------

pub trait CodeValidator: Send + Sync {
    /// Syntax check only; semantic correctness is out of scope.
    fn validate(&self, code: &str) -> CodeValidationResult;
}

pub trait ComplexityAnalyzer: Send + Sync {
    fn analyze(&self, code: &str) -> ComplexityResult;
}
