//! Collaborator doubles for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use explainer_shared::{
    CodeValidationResult, CodeValidator, ComplexityAnalyzer, ComplexityResult, DocHit, DocSearch,
    ExplainerError, ModelSelector, ReasoningDepth, Result, TaskType, TextGenerator, WebHit,
    WebSearch,
};

/// Replays scripted responses in order. Once the script is exhausted it
/// answers with `exhausted`, or a transport error when that is `None`.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<String>>,
    exhausted: Option<String>,
    log: Mutex<Vec<(String, f32)>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(Into::into).collect()),
            exhausted: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `response`.
    pub fn constant(response: &str) -> Self {
        Self {
            exhausted: Some(response.to_string()),
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Every call fails as if the backend were down.
    pub fn unreachable() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn temperatures(&self) -> Vec<f32> {
        self.log.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _model: &str, temperature: f32) -> Result<String> {
        self.log
            .lock()
            .unwrap()
            .push((prompt.to_string(), temperature));
        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.exhausted.clone())
            .ok_or_else(|| ExplainerError::Generation("connection refused".into()))
    }
}

/// Returns one fixed model id and records the requests it routed.
#[derive(Default)]
pub struct FixedSelector {
    pub requests: Mutex<Vec<(TaskType, usize, ReasoningDepth)>>,
}

impl ModelSelector for FixedSelector {
    fn select_model(&self, task: TaskType, input_length: usize, depth: ReasoningDepth) -> String {
        self.requests
            .lock()
            .unwrap()
            .push((task, input_length, depth));
        "test-model".into()
    }
}

/// Similarity search returning canned hits after an optional delay.
#[derive(Default)]
pub struct StaticDocs {
    pub hits: Vec<DocHit>,
    pub delay: Duration,
    pub queries: Mutex<Vec<String>>,
}

impl StaticDocs {
    pub fn new(hits: Vec<DocHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl DocSearch for StaticDocs {
    async fn search(&self, query: &str) -> Result<Vec<DocHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        tokio::time::sleep(self.delay).await;
        Ok(self.hits.clone())
    }
}

/// Web search returning canned hits after an optional delay, or failing.
#[derive(Default)]
pub struct StaticWeb {
    pub hits: Vec<WebHit>,
    pub delay: Duration,
    pub fail: bool,
    pub queries: Mutex<Vec<(String, usize)>>,
}

impl StaticWeb {
    pub fn new(hits: Vec<WebHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl WebSearch for StaticWeb {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ExplainerError::Search("provider unavailable".into()));
        }
        Ok(self.hits.clone())
    }

    fn provider(&self) -> &str {
        "static"
    }
}

/// Accepts any non-blank code and records what it was asked to check.
#[derive(Default)]
pub struct LenientValidator {
    pub seen: Mutex<Vec<String>>,
}

impl CodeValidator for LenientValidator {
    fn validate(&self, code: &str) -> CodeValidationResult {
        self.seen.lock().unwrap().push(code.to_string());
        if code.trim().is_empty() {
            CodeValidationResult::invalid("Empty code", None, None)
        } else {
            CodeValidationResult::ok()
        }
    }
}

/// Reports one fixed block for every input.
#[derive(Default)]
pub struct CountingComplexity {
    pub calls: Mutex<usize>,
}

impl ComplexityAnalyzer for CountingComplexity {
    fn analyze(&self, _code: &str) -> ComplexityResult {
        *self.calls.lock().unwrap() += 1;
        ComplexityResult {
            available: Some(true),
            avg_complexity: Some(1.0),
            max_complexity: Some(1),
            ..ComplexityResult::default()
        }
    }
}
