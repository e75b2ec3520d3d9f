//! End-to-end request pipeline: question → analysis → {docs, examples} → tools → answer.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use explainer_shared::{
    CodeValidator, ComplexityAnalyzer, ComplexityResult, DocSearch, DocumentationResult,
    ExampleFinderResult, FinalAnswer, ModelSelector, QueryAnalysis, Result, TextGenerator,
    WebSearch,
};

use crate::agents::{
    Agent, CodeExplainerAgent, DocReaderAgent, ExampleFinderAgent, QueryAnalyzerAgent,
    SynthesisRequest,
};
use crate::normalize::strip_fences;

pub type AnalyzerAgent = Arc<dyn Agent<Input = str, Output = QueryAnalysis>>;
pub type DocAgent = Arc<dyn Agent<Input = QueryAnalysis, Output = DocumentationResult>>;
pub type ExampleAgent = Arc<dyn Agent<Input = QueryAnalysis, Output = ExampleFinderResult>>;
pub type ExplainerAgent = Arc<dyn Agent<Input = SynthesisRequest, Output = FinalAnswer>>;

/// Substrings marking a doc snippet as usable code for the tool stage.
const DOC_CODE_SIGNALS: &[&str] = &["def ", "import ", "class ", "@app."];

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the answer is ready.
    fn done(&self, answer: &FinalAnswer);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _answer: &FinalAnswer) {}
}

/// Concrete collaborators used to build the default agent set.
pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub selector: Arc<dyn ModelSelector>,
    pub docs: Arc<dyn DocSearch>,
    pub web: Arc<dyn WebSearch>,
    pub validator: Arc<dyn CodeValidator>,
    pub complexity: Arc<dyn ComplexityAnalyzer>,
}

/// Runs the fixed stage sequence for one question at a time. Cheap to share
/// behind an `Arc`; holds no per-request state.
pub struct Orchestrator {
    analyzer: AnalyzerAgent,
    doc_reader: DocAgent,
    example_finder: ExampleAgent,
    explainer: ExplainerAgent,
    validator: Arc<dyn CodeValidator>,
    complexity: Arc<dyn ComplexityAnalyzer>,
}

impl Orchestrator {
    pub fn new(
        analyzer: AnalyzerAgent,
        doc_reader: DocAgent,
        example_finder: ExampleAgent,
        explainer: ExplainerAgent,
        validator: Arc<dyn CodeValidator>,
        complexity: Arc<dyn ComplexityAnalyzer>,
    ) -> Self {
        Self {
            analyzer,
            doc_reader,
            example_finder,
            explainer,
            validator,
            complexity,
        }
    }

    /// Build the standard four agents over the given collaborators.
    pub fn from_collaborators(c: Collaborators) -> Self {
        Self::new(
            Arc::new(QueryAnalyzerAgent::new(c.generator.clone(), c.selector.clone())),
            Arc::new(DocReaderAgent::new(c.docs)),
            Arc::new(ExampleFinderAgent::new(c.web)),
            Arc::new(CodeExplainerAgent::new(c.generator, c.selector)),
            c.validator,
            c.complexity,
        )
    }

    pub async fn process_query(&self, query: &str) -> Result<FinalAnswer> {
        self.process_query_with(query, &SilentProgress).await
    }

    /// Run every stage, validating each contract before it moves downstream.
    #[instrument(skip_all, fields(request_id = %uuid::Uuid::now_v7()))]
    pub async fn process_query_with(
        &self,
        query: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<FinalAnswer> {
        let start = Instant::now();
        info!(query_len = query.len(), "processing query");

        // --- Stage 1: classification ---
        progress.phase("Classifying question");
        let analysis = self.analyzer.execute(query).await?;
        analysis.validate()?;
        info!(
            framework = %analysis.framework,
            topic = %analysis.topic,
            "query analyzed"
        );

        // --- Stage 2: documentation + examples, concurrently ---
        progress.phase("Searching documentation and examples");
        let (documentation, examples) = tokio::try_join!(
            self.doc_reader.execute(&analysis),
            self.example_finder.execute(&analysis),
        )?;
        documentation.validate()?;
        examples.validate()?;

        // --- Stage 3: tools ---
        progress.phase("Checking code");
        let candidate = code_candidate(&examples, &documentation);
        let validation = self.validator.validate(&candidate);
        validation.validate()?;
        let complexity = if validation.valid {
            self.complexity.analyze(&candidate)
        } else {
            ComplexityResult::default()
        };
        complexity.validate()?;

        // --- Stage 4: synthesis ---
        progress.phase("Writing answer");
        let answer = self
            .explainer
            .execute(&SynthesisRequest {
                query: query.to_string(),
                analysis,
                documentation,
                examples,
                validation,
                complexity,
            })
            .await?;
        answer.validate()?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            sources = answer.sources.len(),
            "query answered"
        );
        progress.done(&answer);
        Ok(answer)
    }
}

/// Example code with fences stripped; failing that, the first doc snippet
/// that looks like code.
fn code_candidate(examples: &ExampleFinderResult, docs: &DocumentationResult) -> String {
    let candidate = strip_fences(&examples.code_example);
    if !candidate.is_empty() {
        return candidate;
    }
    docs.snippets
        .iter()
        .find(|s| DOC_CODE_SIGNALS.iter().any(|sig| s.text.contains(sig)))
        .map(|s| s.text.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::testing::{
        CountingComplexity, FixedSelector, LenientValidator, ScriptedGenerator, StaticDocs,
        StaticWeb,
    };
    use explainer_shared::{
        DocHit, DocSnippet, ExplainerError, MIN_BEST_PRACTICES, MIN_LINE_BY_LINE, WebHit,
    };

    struct Harness {
        generator: Arc<ScriptedGenerator>,
        validator: Arc<LenientValidator>,
        complexity: Arc<CountingComplexity>,
        orchestrator: Orchestrator,
    }

    fn harness(generator: ScriptedGenerator, docs: StaticDocs, web: StaticWeb) -> Harness {
        let generator = Arc::new(generator);
        let validator = Arc::new(LenientValidator::default());
        let complexity = Arc::new(CountingComplexity::default());
        let orchestrator = Orchestrator::from_collaborators(Collaborators {
            generator: generator.clone(),
            selector: Arc::new(FixedSelector::default()),
            docs: Arc::new(docs),
            web: Arc::new(web),
            validator: validator.clone(),
            complexity: complexity.clone(),
        });
        Harness {
            generator,
            validator,
            complexity,
            orchestrator,
        }
    }

    fn assert_invariants(answer: &FinalAnswer) {
        assert!(answer.best_practices.len() >= MIN_BEST_PRACTICES);
        assert!(answer.line_by_line.len() >= MIN_LINE_BY_LINE);
        assert!(!answer.sources.is_empty());
        assert!(!answer.explanation.trim().is_empty());
        assert!(!answer.meta.framework.is_empty());
        assert!(!answer.meta.topic.is_empty());
    }

    #[tokio::test]
    async fn dependencies_question_with_empty_collaborators() {
        let h = harness(
            ScriptedGenerator::constant(""),
            StaticDocs::default(),
            StaticWeb::default(),
        );

        let answer = h
            .orchestrator
            .process_query("How do Dependencies work?")
            .await
            .unwrap();

        assert_invariants(&answer);
        assert_eq!(answer.meta.framework, "unknown");
        assert_eq!(answer.meta.topic, "dependency_injection");
        assert!(
            answer
                .sources
                .contains(&"https://fastapi.tiangolo.com/tutorial/dependencies/".to_string())
        );
        assert!(answer.code_example.contains("Depends("));
        // 1 classification call + 3 synthesis attempts.
        assert_eq!(h.generator.calls(), 4);
    }

    #[tokio::test]
    async fn zero_results_still_yield_topic_fallback_code() {
        let classification = json!({
            "language": "python",
            "framework": "fastapi",
            "topic": "websocket",
            "keywords": ["fastapi", "websocket"]
        })
        .to_string();
        let synthesis = r#"{"explanation": "Sockets stay open."}"#;
        let h = harness(
            ScriptedGenerator::new([classification.as_str(), synthesis]),
            StaticDocs::default(),
            StaticWeb::default(),
        );

        let answer = h
            .orchestrator
            .process_query("How do WebSockets work in FastAPI?")
            .await
            .unwrap();

        assert_invariants(&answer);
        assert_eq!(answer.explanation, "Sockets stay open.");
        assert!(answer.code_example.contains("@app.websocket(\"/ws\")"));
        assert_eq!(answer.meta.topic, "websocket");
        // Empty candidate: validation fails, complexity is skipped.
        assert_eq!(h.validator.seen.lock().unwrap()[0], "");
        assert_eq!(*h.complexity.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn doc_and_example_phase_runs_concurrently() {
        let delay = Duration::from_millis(300);
        let classification = r#"{"framework": "fastapi", "topic": "rest_api"}"#;
        let h = harness(
            ScriptedGenerator::new([classification, "{}"]),
            StaticDocs::delayed(delay),
            StaticWeb::delayed(delay),
        );

        let start = Instant::now();
        h.orchestrator
            .process_query("REST in FastAPI")
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= delay, "{elapsed:?}");
        assert!(
            elapsed < Duration::from_millis(550),
            "phases ran serially: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn example_code_is_unfenced_before_tools() {
        let web = StaticWeb::new(vec![WebHit {
            title: "gist".into(),
            url: "https://gist.github.com/x".into(),
            snippet: "```python\nimport fastapi\n```".into(),
        }]);
        let h = harness(ScriptedGenerator::constant("{}"), StaticDocs::default(), web);

        let answer = h.orchestrator.process_query("fastapi api").await.unwrap();

        assert_eq!(h.validator.seen.lock().unwrap()[0], "import fastapi");
        assert_eq!(*h.complexity.calls.lock().unwrap(), 1);
        assert_eq!(answer.sources[0], "https://gist.github.com/x");
    }

    #[test]
    fn doc_snippet_is_second_choice_candidate() {
        let docs = DocumentationResult {
            snippets: vec![
                DocSnippet {
                    source: "intro.md".into(),
                    text: "Prose only.".into(),
                    relevance: 0.9,
                },
                DocSnippet {
                    source: "code.md".into(),
                    text: "  from x import y  ".into(),
                    relevance: 0.5,
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            code_candidate(&ExampleFinderResult::default(), &docs),
            "from x import y"
        );
    }

    #[tokio::test]
    async fn branch_failure_fails_the_request() {
        let h = harness(
            ScriptedGenerator::constant("{}"),
            StaticDocs::new(vec![DocHit {
                text: Some("chunk".into()),
                ..DocHit::default()
            }]),
            StaticWeb::failing(),
        );

        let err = h.orchestrator.process_query("anything").await.unwrap_err();
        assert!(matches!(err, ExplainerError::Search(_)));
    }

    struct BrokenAnalyzer;

    #[async_trait]
    impl Agent for BrokenAnalyzer {
        type Input = str;
        type Output = QueryAnalysis;

        fn name(&self) -> &'static str {
            "broken"
        }

        async fn execute(&self, _query: &str) -> Result<QueryAnalysis> {
            Ok(QueryAnalysis {
                topic: "jwt".into(),
                ..QueryAnalysis::default()
            })
        }
    }

    #[tokio::test]
    async fn contract_breach_is_fatal() {
        let generator: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator::constant("{}"));
        let selector: Arc<dyn ModelSelector> = Arc::new(FixedSelector::default());
        let orchestrator = Orchestrator::new(
            Arc::new(BrokenAnalyzer),
            Arc::new(DocReaderAgent::new(Arc::new(StaticDocs::default()))),
            Arc::new(ExampleFinderAgent::new(Arc::new(StaticWeb::default()))),
            Arc::new(CodeExplainerAgent::new(generator, selector)),
            Arc::new(LenientValidator::default()),
            Arc::new(CountingComplexity::default()),
        );

        let err = orchestrator.process_query("jwt?").await.unwrap_err();
        match err {
            ExplainerError::Contract { stage, .. } => assert_eq!(stage, QueryAnalysis::STAGE),
            other => panic!("expected contract error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn answer_serializes_with_meta() {
        let h = harness(
            ScriptedGenerator::constant("{}"),
            StaticDocs::default(),
            StaticWeb::default(),
        );
        let answer = h.orchestrator.process_query("flask routing").await.unwrap();
        let value = serde_json::to_value(&answer).unwrap();
        assert_eq!(value["meta"]["framework"], json!("flask"));
        assert!(value["meta"]["parse_stage"].is_string());
    }
}
