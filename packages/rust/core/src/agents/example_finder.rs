//! Stage 2b: search the web for examples and pick a code candidate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use explainer_shared::{
    ExampleFinderResult, ExampleMeta, QueryAnalysis, Result, WebHit, WebResult, WebSearch,
};

use super::Agent;

const DISCOVERY_HINT: &str = "github example";
const MAX_RESULTS: usize = 5;

/// Substrings suggesting a snippet contains code.
const CODE_SIGNALS: &[&str] = &[
    "def ",
    "class ",
    "import ",
    "from ",
    "async def ",
    "@app.",
    "=>",
    "const ",
    "return ",
    "await ",
    "function ",
    "export ",
    "module.",
    "require(",
];

pub struct ExampleFinderAgent {
    web: Arc<dyn WebSearch>,
}

impl ExampleFinderAgent {
    pub fn new(web: Arc<dyn WebSearch>) -> Self {
        Self { web }
    }
}

#[async_trait]
impl Agent for ExampleFinderAgent {
    type Input = QueryAnalysis;
    type Output = ExampleFinderResult;

    fn name(&self) -> &'static str {
        ExampleFinderResult::STAGE
    }

    #[instrument(skip_all, fields(stage = ExampleFinderResult::STAGE))]
    async fn execute(&self, analysis: &QueryAnalysis) -> Result<ExampleFinderResult> {
        let query = search_query(analysis);
        let hits = self.web.search(&query, MAX_RESULTS).await?;

        let code_example = best_code_snippet(&hits);
        let results: Vec<WebResult> = hits
            .into_iter()
            .map(|h| WebResult {
                title: h.title,
                url: h.url,
                snippet: Some(h.snippet).filter(|s| !s.trim().is_empty()),
            })
            .collect();
        let urls = results
            .iter()
            .map(|r| r.url.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();

        debug!(
            %query,
            results = results.len(),
            has_code = !code_example.is_empty(),
            "examples found"
        );

        Ok(ExampleFinderResult {
            results,
            code_example,
            meta: ExampleMeta {
                query,
                provider: self.web.provider().to_string(),
                urls,
            },
        })
    }
}

/// Keywords (or `framework topic`), then the subtopic, then the hint.
fn search_query(analysis: &QueryAnalysis) -> String {
    let mut q = if analysis.keywords.is_empty() {
        format!("{} {}", analysis.framework, analysis.topic)
    } else {
        analysis.keywords.join(" ")
    };
    if let Some(sub) = &analysis.subtopic {
        q.push(' ');
        q.push_str(sub);
    }
    q.push(' ');
    q.push_str(DISCOVERY_HINT);
    q
}

/// First snippet with a code signal, else the longest snippet, else empty.
fn best_code_snippet(hits: &[WebHit]) -> String {
    let snippets: Vec<&str> = hits
        .iter()
        .map(|h| h.snippet.trim())
        .filter(|s| !s.is_empty())
        .collect();

    // `rev` so the first of equally long snippets wins.
    snippets
        .iter()
        .find(|s| CODE_SIGNALS.iter().any(|sig| s.contains(sig)))
        .or_else(|| snippets.iter().rev().max_by_key(|s| s.chars().count()))
        .copied()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticWeb;
    use explainer_shared::{ExplainerError, Framework};

    fn web_hit(url: &str, snippet: &str) -> WebHit {
        WebHit {
            title: format!("title for {url}"),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn query_shape() {
        let mut analysis = QueryAnalysis {
            framework: Framework::Fastapi,
            topic: "websocket".into(),
            ..QueryAnalysis::default()
        };
        assert_eq!(search_query(&analysis), "fastapi websocket github example");

        analysis.keywords = vec!["ws".into(), "broadcast".into()];
        analysis.subtopic = Some("rooms".into());
        assert_eq!(search_query(&analysis), "ws broadcast rooms github example");
    }

    #[test]
    fn code_signal_beats_length() {
        let hits = vec![
            web_hit(
                "https://a.dev",
                "A very long introduction to websockets without any code at all.",
            ),
            web_hit("https://b.dev", ""),
            web_hit("https://c.dev", "  @app.websocket('/ws')  "),
            web_hit("https://d.dev", "import asyncio"),
        ];
        assert_eq!(best_code_snippet(&hits), "@app.websocket('/ws')");
    }

    #[test]
    fn longest_snippet_when_no_signal() {
        let hits = vec![
            web_hit("https://a.dev", "short"),
            web_hit("https://b.dev", "the longest snippet here"),
            web_hit("https://c.dev", "medium one"),
        ];
        assert_eq!(best_code_snippet(&hits), "the longest snippet here");
        assert_eq!(best_code_snippet(&[]), "");
    }

    #[tokio::test]
    async fn results_and_urls() {
        let web = Arc::new(StaticWeb::new(vec![
            web_hit("https://github.com/x/y", "def handler(): pass"),
            web_hit("", "no url"),
            web_hit("https://blog.dev/post", ""),
        ]));
        let agent = ExampleFinderAgent::new(web.clone());
        let analysis = QueryAnalysis {
            keywords: vec!["fastapi".into()],
            topic: "rest_api".into(),
            ..QueryAnalysis::default()
        };

        let result = agent.execute(&analysis).await.unwrap();
        result.validate().expect("valid contract");

        assert_eq!(result.results.len(), 3);
        assert_eq!(result.results[2].snippet, None);
        assert_eq!(result.code_example, "def handler(): pass");
        assert_eq!(
            result.meta.urls,
            vec!["https://github.com/x/y", "https://blog.dev/post"]
        );
        assert_eq!(result.meta.provider, "static");
        assert_eq!(
            web.queries.lock().unwrap()[0],
            ("fastapi github example".to_string(), MAX_RESULTS)
        );
    }

    #[tokio::test]
    async fn search_failure_propagates() {
        let agent = ExampleFinderAgent::new(Arc::new(StaticWeb::failing()));
        let err = agent.execute(&QueryAnalysis::default()).await.unwrap_err();
        assert!(matches!(err, ExplainerError::Search(_)));
    }
}
