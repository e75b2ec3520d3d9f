//! Result-page scraping.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use explainer_shared::WebHit;

/// Parse up to `max_results` organic results from a DuckDuckGo HTML page.
/// Ads and results without a usable link are skipped.
pub(crate) fn parse_results(html: &str, max_results: usize) -> Vec<WebHit> {
    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    document
        .select(&result_sel)
        .filter(|r| !r.value().classes().any(|c| c == "result--ad"))
        .filter_map(|result| {
            let link = result.select(&link_sel).next()?;
            let url = link.value().attr("href").and_then(resolve_href)?;
            let snippet = result
                .select(&snippet_sel)
                .next()
                .map(collapsed_text)
                .unwrap_or_default();
            Some(WebHit {
                title: collapsed_text(link),
                url,
                snippet,
            })
        })
        .take(max_results)
        .collect()
}

/// Element text with whitespace runs collapsed to single spaces.
fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwrap `/l/?uddg=<target>` redirect links; pass direct http(s) links
/// through.
fn resolve_href(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
        let target = Url::parse(&target).ok()?;
        return matches!(target.scheme(), "http" | "https").then(|| target.to_string());
    }
    matches!(url.scheme(), "http" | "https").then_some(absolute)
}
