//! Stage 2a: look up documentation snippets for the analysis.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use explainer_shared::{
    DocHit, DocSearch, DocSnippet, DocumentationMeta, DocumentationResult, QueryAnalysis, Result,
};

use super::Agent;

const DEFAULT_SOURCE: &str = "local_docs";

pub struct DocReaderAgent {
    docs: Arc<dyn DocSearch>,
}

impl DocReaderAgent {
    pub fn new(docs: Arc<dyn DocSearch>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl Agent for DocReaderAgent {
    type Input = QueryAnalysis;
    type Output = DocumentationResult;

    fn name(&self) -> &'static str {
        DocumentationResult::STAGE
    }

    #[instrument(skip_all, fields(stage = DocumentationResult::STAGE))]
    async fn execute(&self, analysis: &QueryAnalysis) -> Result<DocumentationResult> {
        let query = retrieval_query(analysis);
        let hits = self.docs.search(&query).await?;
        let total = hits.len();

        let snippets: Vec<DocSnippet> = hits.into_iter().filter_map(to_snippet).collect();
        debug!(%query, hits = total, kept = snippets.len(), "documentation retrieved");

        Ok(DocumentationResult {
            meta: DocumentationMeta {
                query,
                top_k: snippets.len(),
                source: self.docs.provider().to_string(),
            },
            snippets,
        })
    }
}

/// Keywords joined by spaces, or the topic when there are none.
fn retrieval_query(analysis: &QueryAnalysis) -> String {
    if analysis.keywords.is_empty() {
        analysis.topic.clone()
    } else {
        analysis.keywords.join(" ")
    }
}

/// Map a raw hit to a snippet. Blank text drops the hit.
fn to_snippet(hit: DocHit) -> Option<DocSnippet> {
    let text = hit.text.or(hit.chunk).filter(|t| !t.trim().is_empty())?;
    let source = hit
        .source
        .or(hit.file)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
    let relevance = coerce_relevance(hit.relevance.as_ref().or(hit.score.as_ref()));

    Some(DocSnippet {
        source,
        text,
        relevance,
    })
}

/// A usable score is a finite number in `[0, 1]`; anything else is 0.0.
/// Out-of-range scores are zeroed, not clamped.
fn coerce_relevance(score: Option<&Value>) -> f64 {
    let parsed = match score {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|r| r.is_finite() && (0.0..=1.0).contains(r))
        .unwrap_or(0.0)
}
