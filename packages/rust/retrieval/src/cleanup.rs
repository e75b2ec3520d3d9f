//! Markdown → plain text cleanup for retrieval.
//!
//! Each pass is a function `&str -> String` applied in sequence. Code stays,
//! markup goes, so chunks embed prose and identifiers without syntax noise.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn clean_markdown(md: &str) -> String {
    let mut result = md.replace("\r\n", "\n");

    result = strip_doc_directives(&result);
    result = strip_code_markers(&result);
    result = strip_images_and_links(&result);
    result = strip_headings(&result);
    result = strip_emphasis(&result);
    result = strip_html(&result);
    result = strip_rules(&result);
    result = collapse_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Documentation tooling directives
// ---------------------------------------------------------------------------

/// Drop `{!> file !}` includes, `hl_lines` attributes, and `///` admonition
/// or `////` tab markers.
fn strip_doc_directives(md: &str) -> String {
    static INCLUDE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\{!>.*?!\}").expect("valid regex"));
    static HL_LINES_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"```[Pp]ython\s+hl_lines=["'][^"']*["']"#).expect("valid regex")
    });
    static MARKER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^///.*$").expect("valid regex"));

    let out = INCLUDE_RE.replace_all(md, "");
    let out = HL_LINES_RE.replace_all(&out, "```python");
    MARKER_RE.replace_all(&out, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Fences and inline code
// ---------------------------------------------------------------------------

/// Remove fence markers and backticks, keep the code itself.
fn strip_code_markers(md: &str) -> String {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```[a-zA-Z]*\n?").expect("valid regex"));
    static INLINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

    let out = FENCE_RE.replace_all(md, "");
    let out = out.replace("```", "");
    INLINE_RE.replace_all(&out, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Images and links
// ---------------------------------------------------------------------------

/// Images vanish entirely; links keep their text.
fn strip_images_and_links(md: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[.*?\]\(.*?\)").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));

    let out = IMAGE_RE.replace_all(md, "");
    LINK_RE.replace_all(&out, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Headings and emphasis
// ---------------------------------------------------------------------------

fn strip_headings(md: &str) -> String {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid regex"));

    HEADING_RE.replace_all(md, "").to_string()
}

/// Strip `*`/`_` emphasis. Underscores inside identifiers such as
/// `snake_case_name` are kept.
fn strip_emphasis(md: &str) -> String {
    static STAR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*{1,3}([^*]+)\*{1,3}").expect("valid regex"));
    // No lookbehind in `regex`: capture the boundary characters instead.
    static UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(^|[^\w])_{1,3}([^_\n]+?)_{1,3}($|[^\w])").expect("valid regex")
    });

    let out = STAR_RE.replace_all(md, "$1");
    UNDERSCORE_RE.replace_all(&out, "${1}${2}${3}").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: HTML, rules, blank lines
// ---------------------------------------------------------------------------

fn strip_html(md: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    TAG_RE.replace_all(md, "").to_string()
}

fn strip_rules(md: &str) -> String {
    static RULE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^[-*_]{3,}[ \t]*$").expect("valid regex"));

    RULE_RE.replace_all(md, "").to_string()
}

/// Collapse runs of 3+ newlines into one blank line.
fn collapse_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}
