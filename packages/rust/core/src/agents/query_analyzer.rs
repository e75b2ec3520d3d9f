//! Stage 1: classify the question into a [`QueryAnalysis`].
//!
//! The model's JSON is sanitized against allow-lists and the topic alias
//! table. When the backend is down, its output cannot be parsed, or it
//! answers `unknown`, deterministic markers over the raw query fill in.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use explainer_shared::{
    Framework, Language, MAX_KEYWORDS, ModelSelector, QueryAnalysis, ReasoningDepth, Result,
    TaskType, TextGenerator, canonical_topic,
};

use super::Agent;
use crate::extract::extract_json_object;
use crate::prompts;

const CLASSIFY_TEMPERATURE: f32 = 0.0;
const UNKNOWN: &str = "unknown";

/// Template words a model sometimes returns instead of a topic.
const TOPIC_PLACEHOLDERS: &[&str] = &["none", "short_main_topic", "main_topic", "topic"];

const NULL_SUBTOPICS: &[&str] = &["", "none", "null"];

/// Topic markers in priority order; the first match wins.
const TOPIC_MARKERS: &[(&str, &str)] = &[
    ("websocket", r"websockets?|web socket|\bws\b"),
    ("authentication", r"\bauth|\bjwt\b|\btokens?\b|\boauth|\blog ?in\b"),
    ("middleware", r"middleware"),
    ("dependency_injection", r"\bdepends?\b|\bdependenc(?:y|ies)\b|\binject"),
    ("database", r"database|\bsql|\borm\b|\bdb\b"),
    ("testing", r"\btest|pytest|unittest"),
    ("deployment", r"\bdeploy|docker|gunicorn|\bk8s\b|kubernetes"),
    ("rest_api", r"\brest(?:ful)?\b|\bapis?\b|endpoint|\bhttp"),
];

/// Framework markers in priority order.
const FRAMEWORK_MARKERS: &[(Framework, &str)] = &[
    (Framework::Django, r"\bdjango\b"),
    (Framework::Flask, r"\bflask\b"),
    (Framework::Fastapi, r"\bfast ?api\b"),
    (Framework::React, r"\breact(?:\.?js)?\b"),
];

/// Keywords recognised by the heuristic fallback, in output order.
const KEYWORD_POOL: &[&str] = &[
    "fastapi",
    "django",
    "flask",
    "react",
    "websocket",
    "authentication",
    "jwt",
    "token",
    "dependency",
    "injection",
    "rest",
    "api",
    "middleware",
    "database",
    "sql",
    "orm",
    "endpoint",
    "route",
    "http",
    "async",
];

static TOPIC_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    TOPIC_MARKERS
        .iter()
        .map(|(topic, pattern)| (*topic, Regex::new(pattern).expect("valid regex")))
        .collect()
});

static FRAMEWORK_RES: LazyLock<Vec<(Framework, Regex)>> = LazyLock::new(|| {
    FRAMEWORK_MARKERS
        .iter()
        .map(|(fw, pattern)| (*fw, Regex::new(pattern).expect("valid regex")))
        .collect()
});

static KEYWORD_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    KEYWORD_POOL
        .iter()
        .map(|kw| {
            let re = Regex::new(&format!(r"\b{}", regex::escape(kw))).expect("valid regex");
            (*kw, re)
        })
        .collect()
});

pub struct QueryAnalyzerAgent {
    generator: Arc<dyn TextGenerator>,
    selector: Arc<dyn ModelSelector>,
}

impl QueryAnalyzerAgent {
    pub fn new(generator: Arc<dyn TextGenerator>, selector: Arc<dyn ModelSelector>) -> Self {
        Self {
            generator,
            selector,
        }
    }
}

#[async_trait]
impl Agent for QueryAnalyzerAgent {
    type Input = str;
    type Output = QueryAnalysis;

    fn name(&self) -> &'static str {
        QueryAnalysis::STAGE
    }

    #[instrument(skip_all, fields(stage = QueryAnalysis::STAGE))]
    async fn execute(&self, query: &str) -> Result<QueryAnalysis> {
        let query = query.trim();
        if query.is_empty() {
            debug!("empty query, using default analysis");
            return Ok(QueryAnalysis::default());
        }

        let model = self.selector.select_model(
            TaskType::Classify,
            query.chars().count(),
            ReasoningDepth::Shallow,
        );
        let prompt = prompts::classification(query);

        let raw = match self
            .generator
            .generate(&prompt, &model, CLASSIFY_TEMPERATURE)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "classifier backend failed, using heuristics");
                return Ok(heuristic_analysis(query));
            }
        };
        debug!(raw = %raw, "raw classifier output");

        let analysis = match extract_json_object(&raw) {
            Ok(data) => sanitize(&data, query),
            Err(e) => {
                warn!(error = %e, "classifier output unparseable, using heuristics");
                heuristic_analysis(query)
            }
        };
        debug!(
            framework = %analysis.framework,
            topic = %analysis.topic,
            keywords = analysis.keywords.len(),
            "query classified"
        );
        Ok(analysis)
    }
}

// ---------------------------------------------------------------------------
// Sanitizing model output
// ---------------------------------------------------------------------------

/// Read a field as text. JSON `null` and missing keys are `None`.
fn text_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn sanitize(data: &Map<String, Value>, query: &str) -> QueryAnalysis {
    let language = text_field(data, "language")
        .map(|s| Language::from_model(&s))
        .unwrap_or_default();
    let mut framework = text_field(data, "framework")
        .map(|s| Framework::from_model(&s))
        .unwrap_or_default();
    let mut topic = sanitize_topic(&text_field(data, "topic").unwrap_or_default());

    let subtopic = text_field(data, "subtopic")
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !NULL_SUBTOPICS.contains(&s.as_str()));

    let keywords = match data.get("keywords") {
        Some(Value::Array(items)) => clean_keywords(items.iter().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        _ => Vec::new(),
    };

    let (inferred_framework, inferred_topic) = infer_framework_topic(query);
    if framework.is_unknown() {
        framework = inferred_framework;
    }
    if topic == UNKNOWN {
        topic = inferred_topic.to_string();
    }

    QueryAnalysis {
        language,
        framework,
        topic,
        subtopic,
        keywords,
    }
}

/// Lowercase, drop template words, and collapse aliases. The result is a
/// fixed point of [`canonical_topic`].
fn sanitize_topic(raw: &str) -> String {
    let topic = raw.trim().to_lowercase();
    if topic.is_empty() || TOPIC_PLACEHOLDERS.contains(&topic.as_str()) {
        return UNKNOWN.into();
    }
    let topic = canonical_topic(&topic).replace([' ', '-'], "_");
    canonical_topic(&topic).to_string()
}

/// Trim, lowercase, drop blanks and repeats, cap at [`MAX_KEYWORDS`].
fn clean_keywords(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .take(MAX_KEYWORDS)
        .collect()
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

/// Scan the raw query for framework and topic markers.
pub fn infer_framework_topic(query: &str) -> (Framework, &'static str) {
    let q = query.to_lowercase();

    let framework = FRAMEWORK_RES
        .iter()
        .find(|(_, re)| re.is_match(&q))
        .map_or(Framework::Unknown, |(fw, _)| *fw);
    let topic = TOPIC_RES
        .iter()
        .find(|(_, re)| re.is_match(&q))
        .map_or(UNKNOWN, |(topic, _)| *topic);

    (framework, topic)
}

fn heuristic_keywords(query: &str, framework: Framework) -> Vec<String> {
    let q = query.to_lowercase();
    let found: Vec<String> = KEYWORD_RES
        .iter()
        .filter(|(_, re)| re.is_match(&q))
        .map(|(kw, _)| kw.to_string())
        .collect();

    if !found.is_empty() {
        return clean_keywords(found);
    }
    if framework.is_unknown() {
        vec!["python".into()]
    } else {
        vec![framework.as_str().into()]
    }
}

fn heuristic_analysis(query: &str) -> QueryAnalysis {
    let (framework, topic) = infer_framework_topic(query);
    QueryAnalysis {
        language: Language::Python,
        framework,
        topic: topic.to_string(),
        subtopic: None,
        keywords: heuristic_keywords(query, framework),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedSelector, ScriptedGenerator};

    fn agent(generator: Arc<ScriptedGenerator>) -> (QueryAnalyzerAgent, Arc<FixedSelector>) {
        let selector = Arc::new(FixedSelector::default());
        (QueryAnalyzerAgent::new(generator, selector.clone()), selector)
    }

    #[tokio::test]
    async fn empty_query_skips_backend() {
        let generator = Arc::new(ScriptedGenerator::constant("{}"));
        let (agent, _) = agent(generator.clone());

        let analysis = agent.execute("   ").await.unwrap();
        assert_eq!(analysis, QueryAnalysis::default());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn model_output_is_sanitized() {
        let generator = Arc::new(ScriptedGenerator::new([r#"```json
{"language": "Python", "framework": "fastapi|django", "topic": "JWT",
 "subtopic": "None",
 "keywords": ["JWT", "Token", "jwt", " ", "a", "b", "c", "d", "e", "f", "g"]}
```"#]));
        let (agent, selector) = agent(generator.clone());

        let analysis = agent
            .execute("How do I check a JWT in FastAPI?")
            .await
            .unwrap();
        assert_eq!(analysis.language, Language::Python);
        assert_eq!(analysis.framework, Framework::Fastapi);
        assert_eq!(analysis.topic, "authentication");
        assert_eq!(analysis.subtopic, None);
        assert_eq!(
            analysis.keywords,
            vec!["jwt", "token", "a", "b", "c", "d", "e", "f"]
        );
        analysis.validate().expect("valid contract");

        let requests = selector.requests.lock().unwrap();
        assert_eq!(requests[0].0, TaskType::Classify);
        assert_eq!(requests[0].2, ReasoningDepth::Shallow);
        assert_eq!(generator.temperatures(), vec![CLASSIFY_TEMPERATURE]);
    }

    #[tokio::test]
    async fn unknown_fields_are_completed_from_query() {
        let generator = Arc::new(ScriptedGenerator::new([
            r#"{"framework": "unknown", "topic": "short_main_topic", "keywords": []}"#,
        ]));
        let (agent, _) = agent(generator);

        let analysis = agent
            .execute("How do I write middleware in Django?")
            .await
            .unwrap();
        assert_eq!(analysis.framework, Framework::Django);
        assert_eq!(analysis.topic, "middleware");
        assert_eq!(analysis.language, Language::Unknown);
        assert!(analysis.keywords.is_empty());
    }

    #[tokio::test]
    async fn unparseable_output_falls_back_to_heuristics() {
        let generator = Arc::new(ScriptedGenerator::constant("I think it is about DI."));
        let (agent, _) = agent(generator);

        let analysis = agent.execute("How do Dependencies work?").await.unwrap();
        assert_eq!(analysis.framework, Framework::Unknown);
        assert_eq!(analysis.topic, "dependency_injection");
        assert_eq!(analysis.language, Language::Python);
        assert_eq!(analysis.keywords, vec!["python"]);
        analysis.validate().expect("valid contract");
    }

    #[tokio::test]
    async fn backend_failure_falls_back_to_heuristics() {
        let generator = Arc::new(ScriptedGenerator::unreachable());
        let (agent, _) = agent(generator);

        let analysis = agent.execute("FastAPI websocket auth").await.unwrap();
        assert_eq!(analysis.framework, Framework::Fastapi);
        assert_eq!(analysis.topic, "websocket");
        assert_eq!(analysis.keywords, vec!["fastapi", "websocket"]);
    }

    #[test]
    fn topic_markers_follow_priority() {
        let cases = [
            ("websocket login flow", "websocket"),
            ("jwt middleware", "authentication"),
            ("middleware that injects a db session", "middleware"),
            ("inject a sql session", "dependency_injection"),
            ("test my sqlalchemy models", "database"),
            ("pytest with docker", "testing"),
            ("deploy an api with gunicorn", "deployment"),
            ("build a REST endpoint", "rest_api"),
            ("what is python", "unknown"),
        ];
        for (query, expected) in cases {
            assert_eq!(infer_framework_topic(query).1, expected, "{query}");
        }
    }

    #[test]
    fn framework_markers_follow_priority() {
        assert_eq!(infer_framework_topic("django vs flask").0, Framework::Django);
        assert_eq!(infer_framework_topic("flask or fastapi").0, Framework::Flask);
        assert_eq!(
            infer_framework_topic("Fast API routing").0,
            Framework::Fastapi
        );
        assert_eq!(infer_framework_topic("React.js hooks").0, Framework::React);
        assert_eq!(
            infer_framework_topic("reactive streams").0,
            Framework::Unknown
        );
    }

    #[test]
    fn topic_sanitizing_is_canonical() {
        assert_eq!(
            sanitize_topic("Dependency Injection"),
            "dependency_injection"
        );
        assert_eq!(sanitize_topic("rest api"), "rest_api");
        assert_eq!(sanitize_topic("Background-Tasks"), "background_tasks");
        assert_eq!(sanitize_topic("topic"), UNKNOWN);
        assert_eq!(sanitize_topic(""), UNKNOWN);
        for raw in ["ws", "OAuth2", "db", "routing"] {
            let once = sanitize_topic(raw);
            assert_eq!(sanitize_topic(&once), once);
        }
    }

    #[test]
    fn heuristic_keywords_use_word_starts() {
        assert_eq!(
            heuristic_keywords("Async routes with a REST API", Framework::Unknown),
            vec!["rest", "api", "route", "async"]
        );
        assert_eq!(
            heuristic_keywords("interesting", Framework::Flask),
            vec!["flask"]
        );
    }
}
