//! Backfill layer that turns any parsed model object into a valid
//! [`FinalAnswer`].
//!
//! Each field has its own pass. The passes never fail: missing, mistyped or
//! placeholder values are replaced from [`crate::fallbacks`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use explainer_shared::{
    AnswerMeta, ExampleFinderResult, FinalAnswer, Framework, MIN_BEST_PRACTICES, MIN_LINE_BY_LINE,
};

use crate::fallbacks;
use crate::repair::RepairStage;

/// Template text models echo back instead of real content.
const PLACEHOLDERS: &[&str] = &[
    "bullets",
    "line-by-line explanation bullets",
    "best practice bullets",
    "line by line explanation",
    "explanation bullets",
    "best practices",
    "list of urls or source names",
    "urls or names",
];

/// Marker of the deterministic fallback explanation.
const PARSE_FAILURE_MARKER: &str = "could not parse model output";

/// Request-level values the backfill falls back to.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub framework: Framework,
    pub topic: &'a str,
    pub examples: &'a ExampleFinderResult,
    pub stage: RepairStage,
}

/// Apply every backfill pass and assemble the answer.
pub fn normalize_answer(mut data: Map<String, Value>, ctx: &NormalizeContext<'_>) -> FinalAnswer {
    let explanation = normalize_explanation(data.remove("explanation"), ctx);
    let best_practices = normalize_best_practices(data.remove("best_practices"));
    let line_by_line = normalize_line_by_line(data.remove("line_by_line"), ctx);
    let code_example = normalize_code_example(data.remove("code_example"), ctx);
    let sources = merge_sources(data.remove("sources"), ctx);
    let meta = normalize_meta(data.remove("meta"), ctx);

    FinalAnswer {
        explanation,
        code_example,
        line_by_line,
        best_practices,
        sources,
        meta,
    }
}

pub fn is_placeholder(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || PLACEHOLDERS.contains(&s.to_lowercase().as_str())
}

// ---------------------------------------------------------------------------
// Text fields
// ---------------------------------------------------------------------------

fn normalize_explanation(value: Option<Value>, ctx: &NormalizeContext<'_>) -> String {
    match value {
        Some(Value::String(s))
            if !is_placeholder(&s) && !s.to_lowercase().contains(PARSE_FAILURE_MARKER) =>
        {
            s.trim().to_string()
        }
        _ => fallbacks::explanation(ctx.topic, ctx.framework),
    }
}

fn normalize_code_example(value: Option<Value>, ctx: &NormalizeContext<'_>) -> String {
    let raw = match value {
        Some(Value::String(s)) => s,
        Some(Value::Object(mut obj)) => ["code", "content"]
            .iter()
            .find_map(|key| match obj.remove(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .unwrap_or_default(),
        _ => String::new(),
    };

    let code = strip_fences(&normalize_line_endings(&decode_escapes(&raw)));
    if is_placeholder(&code) {
        fallbacks::code_example(ctx.topic, ctx.framework)
    } else {
        code
    }
}

/// Remove Markdown fence lines from a code block.
pub fn strip_fences(code: &str) -> String {
    let code = code.trim();
    if !code.starts_with("```") {
        return code.to_string();
    }
    code.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn normalize_line_endings(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Decode literal escape sequences left behind by a double-escaped string.
///
/// `\uXXXX` and `\xHH` are always decoded. The single-character escapes
/// (`\n`, `\t`, `\r`, quotes, backslash) are decoded only when the text has
/// no real line break: code that already spans lines keeps them verbatim.
pub fn decode_escapes(s: &str) -> String {
    static TRIGGER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\\[ntrux]").expect("valid regex"));

    if !TRIGGER_RE.is_match(s) {
        return s.to_string();
    }
    let single_line = !s.contains('\n');

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('u') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                match decode_unicode(&mut lookahead) {
                    Some(decoded) => {
                        out.push(decoded);
                        chars = lookahead;
                    }
                    None => out.push('\\'),
                }
            }
            Some('x') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                match take_hex(&mut lookahead, 2).and_then(char::from_u32) {
                    Some(decoded) => {
                        out.push(decoded);
                        chars = lookahead;
                    }
                    None => out.push('\\'),
                }
            }
            Some('\\') if !single_line => {
                chars.next();
                out.push_str("\\\\");
            }
            Some(next) if single_line => match simple_escape(next) {
                Some(decoded) => push_consumed(&mut out, &mut chars, decoded),
                None => out.push('\\'),
            },
            _ => out.push('\\'),
        }
    }

    out
}

fn simple_escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '\\' | '"' | '\'' | '/' => Some(c),
        _ => None,
    }
}

fn push_consumed(
    out: &mut String,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    decoded: char,
) {
    chars.next();
    out.push(decoded);
}

/// Decode the `XXXX` after `\u`, joining UTF-16 surrogate pairs.
fn decode_unicode(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<char> {
    let unit = take_hex(chars, 4)?;
    if (0xD800..0xDC00).contains(&unit) {
        if chars.next()? != '\\' || chars.next()? != 'u' {
            return None;
        }
        let low = take_hex(chars, 4)?;
        if !(0xDC00..0xE000).contains(&low) {
            return None;
        }
        return char::from_u32(0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00));
    }
    char::from_u32(unit)
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, len: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..len {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

// ---------------------------------------------------------------------------
// List fields
// ---------------------------------------------------------------------------

/// Coerce a model value into a list of non-placeholder strings.
/// A keyed object contributes its values.
fn string_list(value: Option<Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(_, v)| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter(|s| !is_placeholder(s))
        .map(|s| s.trim().to_string())
        .collect()
}

/// Append pool items not already present until `list` holds `min` entries.
fn pad_from_pool(list: &mut Vec<String>, pool: &[String], min: usize) {
    for item in pool {
        if list.len() >= min {
            break;
        }
        if !list.contains(item) {
            list.push(item.clone());
        }
    }
}

fn normalize_best_practices(value: Option<Value>) -> Vec<String> {
    let mut list = string_list(value);
    let pool: Vec<String> = fallbacks::GENERIC_BEST_PRACTICES
        .iter()
        .map(|s| s.to_string())
        .collect();
    pad_from_pool(&mut list, &pool, MIN_BEST_PRACTICES);
    list
}

fn normalize_line_by_line(value: Option<Value>, ctx: &NormalizeContext<'_>) -> Vec<String> {
    let mut list = string_list(value);
    let pool = fallbacks::line_by_line(ctx.topic, ctx.framework);
    pad_from_pool(&mut list, &pool, MIN_LINE_BY_LINE);
    list
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Parse `s` as an absolute http(s) URL with a host.
fn http_url(s: &str) -> Option<Url> {
    let url = Url::parse(s.trim()).ok()?;
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    (matches!(url.scheme(), "http" | "https") && has_host).then_some(url)
}

/// Union model URLs, example-stage URLs and the canonical docs URL in
/// first-seen order. Duplicates are detected on the parsed URL so
/// `https://a.dev` and `https://a.dev/` count once.
fn merge_sources(value: Option<Value>, ctx: &NormalizeContext<'_>) -> Vec<String> {
    let model_urls = string_list(value);
    let example_urls = ctx
        .examples
        .results
        .iter()
        .take(3)
        .map(|r| r.url.clone())
        .chain(ctx.examples.meta.urls.iter().cloned());
    let canonical = fallbacks::canonical_doc_url(ctx.framework, ctx.topic).to_string();

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for candidate in model_urls
        .into_iter()
        .chain(example_urls)
        .chain(std::iter::once(canonical))
    {
        let Some(url) = http_url(&candidate) else {
            continue;
        };
        if seen.insert(url.to_string()) {
            merged.push(candidate.trim().to_string());
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

fn normalize_meta(value: Option<Value>, ctx: &NormalizeContext<'_>) -> AnswerMeta {
    let mut extra = match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let mut take_text = |key: &str, default: &str| match extra.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => default.to_string(),
    };
    let framework = take_text("framework", ctx.framework.as_str());
    let topic = take_text("topic", ctx.topic);

    let stage = Value::String(ctx.stage.as_str().into());
    extra.insert("parse_stage".into(), stage);

    AnswerMeta {
        framework,
        topic,
        extra,
    }
}
