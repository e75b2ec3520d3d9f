//! Prompt templates for the classification and synthesis stages.

use explainer_shared::{
    CodeValidationResult, ComplexityResult, DocumentationResult, ExampleFinderResult, Framework,
};

/// Maximum doc snippets / web results quoted in the synthesis prompt.
const CONTEXT_ITEMS: usize = 3;

pub fn classification(query: &str) -> String {
    format!(
        r#"You are a query analyzer agent.

Return ONLY valid JSON that EXACTLY matches this schema:
{{
  "language": "python|javascript|java|unknown",
  "framework": "fastapi|django|flask|react|unknown",
  "topic": "websocket",
  "subtopic": null,
  "keywords": ["3-8 search keywords"]
}}

The "topic" field above shows an EXAMPLE value ("websocket").
You MUST replace it with the actual topic from the query below.
Good topic values: "websocket", "rest_api", "dependency_injection",
"authentication", "middleware", "database", "routing", "testing", "deployment".

STRICT RULES:
- Return ONLY JSON (no markdown, no extra text).
- All values MUST be lowercase.
- "framework" MUST be ONE value only (not a list, not 'a|b|c').
- "topic" MUST describe the actual subject. NEVER return "short_main_topic".
- If you are unsure about framework, use "unknown".

Query: {query}"#
    )
}

/// Everything the synthesis prompt quotes.
pub struct SynthesisContext<'a> {
    pub query: &'a str,
    pub framework: Framework,
    pub topic: &'a str,
    pub code_rule: &'a str,
    pub documentation: &'a DocumentationResult,
    pub examples: &'a ExampleFinderResult,
    pub validation: &'a CodeValidationResult,
    pub complexity: &'a ComplexityResult,
}

pub fn synthesis(ctx: &SynthesisContext<'_>) -> String {
    let framework = ctx.framework;
    let topic = ctx.topic;
    let doc_context = format_doc_snippets(ctx.documentation);
    let web_context = format_web_results(ctx.examples);
    let validation = serde_json::to_string(ctx.validation).unwrap_or_default();
    let complexity = serde_json::to_string(ctx.complexity).unwrap_or_default();

    format!(
        r#"You are a senior software engineer and teacher.

User question:
{query}

Context (official documentation snippets):
{doc_context}

Context (web results):
{web_context}

Code validation result:
{validation}

Complexity info:
{complexity}

Return ONLY valid JSON in this schema:
{{
  "explanation": "2-3 sentence explanation of the concept",
  "code_example": "complete runnable python code here",
  "line_by_line": [
    "Line 1 does X because Y",
    "Line 2 does X because Y"
  ],
  "best_practices": [
    "Always do X to avoid Y",
    "Use Z when W"
  ],
  "sources": ["https://actual-url.com"],
  "meta": {{"framework": "{framework}", "topic": "{topic}"}}
}}

Rules:
- No extra text, only JSON.
- NEVER copy the example values above. Replace them with real content.
- code_example MUST be a complete, runnable {framework} example relevant to: {topic}.
- {code_rule}
- line_by_line MUST have at least 6 items.
- best_practices MUST have at least 4 items.
- sources MUST contain real URLs from the web results context above."#,
        query = ctx.query,
        code_rule = ctx.code_rule,
    )
}

/// Second attempt: convert the previous output into strict JSON.
pub fn repair(previous: &str, framework: Framework, topic: &str) -> String {
    format!(
        r#"Convert the content below into VALID JSON that EXACTLY matches this schema.
Return ONLY JSON. No markdown. No extra keys.
IMPORTANT:
- Use ONLY double quotes for JSON strings.
- Escape inner quotes as \"
- Do NOT put raw newlines inside JSON strings; use \n instead.

Schema:
{{
  "explanation": "2-3 sentence explanation",
  "code_example": "python code as a string",
  "line_by_line": ["bullets"],
  "best_practices": ["bullets"],
  "sources": ["urls"],
  "meta": {{"framework": "{framework}", "topic": "{topic}"}}
}}

Content:
{previous}
"#
    )
}

/// Last attempt: one minified object with the exact key set.
pub fn hard_repair(previous: &str, framework: Framework, topic: &str) -> String {
    format!(
        r#"Return STRICT VALID MINIFIED JSON ONLY (one JSON object).
Rules:
- Use ONLY double quotes.
- Escape all inner quotes as \"
- Replace all newlines in strings with \n
- No trailing commas.
- Keys MUST be exactly:
  explanation, code_example, line_by_line, best_practices, sources, meta

framework="{framework}"
topic="{topic}"

Content:
{previous}
"#
    )
}

fn format_doc_snippets(docs: &DocumentationResult) -> String {
    let blocks: Vec<String> = docs
        .snippets
        .iter()
        .take(CONTEXT_ITEMS)
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| format!("[Source: {}]\n{}", s.source, s.text.trim()))
        .collect();

    if blocks.is_empty() {
        "No documentation found.".into()
    } else {
        blocks.join("\n\n---\n\n")
    }
}

fn format_web_results(examples: &ExampleFinderResult) -> String {
    let blocks: Vec<String> = examples
        .results
        .iter()
        .take(CONTEXT_ITEMS)
        .enumerate()
        .map(|(i, r)| {
            let title = if r.title.is_empty() { "No title" } else { r.title.as_str() };
            let snippet = r.snippet.as_deref().unwrap_or_default().trim();
            format!("[{}] {title}\nURL: {}\n{snippet}", i + 1, r.url)
        })
        .collect();

    if blocks.is_empty() {
        "No web results found.".into()
    } else {
        blocks.join("\n\n")
    }
}
