//! Web search used as a last resort when the vault has nothing relevant.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::{Error, Result};

const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!("vaultrag/", env!("CARGO_PKG_VERSION"));

/// Number of results folded into the returned text.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// An external search engine returning a single block of text.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

/// Scrapes the DuckDuckGo HTML endpoint. Needs no API key.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::unavailable("web search", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<String> {
        let url = format!(
            "{DDG_HTML_ENDPOINT}?q={}",
            utf8_percent_encode(query, NON_ALPHANUMERIC)
        );
        tracing::debug!(%url, "querying web search");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::unavailable("web search", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::unavailable(
                "web search",
                format!("HTTP {status}"),
            ));
        }
        let html = response
            .text()
            .await
            .map_err(|e| Error::unavailable("web search", e))?;

        let results = parse_results(&html, DEFAULT_MAX_RESULTS);
        if results.is_empty() {
            return Err(Error::unavailable("web search", "no results"));
        }
        Ok(format_results(&results))
    }
}

/// One scraped result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

fn format_results(results: &[WebResult]) -> String {
    results
        .iter()
        .map(|r| {
            if r.snippet.is_empty() {
                format!("{} ({})", r.title, r.url)
            } else {
                format!("{}: {} ({})", r.title, r.snippet, r.url)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull titles, snippets and links out of a DuckDuckGo HTML result page.
pub fn parse_results(html: &str, max: usize) -> Vec<WebResult> {
    let mut results = Vec::new();

    for segment in html.split("class=\"result__a\"").skip(1) {
        if results.len() >= max {
            break;
        }

        let title = between(segment, ">", "</a>")
            .map(clean_markup)
            .unwrap_or_default();
        let url = between(segment, "href=\"", "\"")
            .map(decode_entities)
            .unwrap_or_default();
        let snippet = segment
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|s| between(s, ">", "</a>"))
            .map(clean_markup)
            .unwrap_or_default();

        if !title.is_empty() {
            results.push(WebResult {
                title,
                snippet,
                url: url.trim().to_string(),
            });
        }
    }

    results
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    Some(&rest[..rest.find(end)?])
}

/// Drop inline tags (DuckDuckGo wraps matches in `<b>`) and decode the
/// handful of entities it emits.
fn clean_markup(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    decode_entities(out.trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.com/pie">Apple <b>Pie</b> &amp; More</a>
  <a class="result__snippet" href="https://example.com/pie">The best <b>apple pie</b> recipe.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.org/tart">Apple Tart</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.net/x">Third</a>
</div>
"#;

    #[test]
    fn parses_title_snippet_and_url() {
        let results = parse_results(PAGE, 5);
        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0],
            WebResult {
                title: "Apple Pie & More".into(),
                snippet: "The best apple pie recipe.".into(),
                url: "https://example.com/pie".into(),
            }
        );
        assert_eq!(results[1].title, "Apple Tart");
        assert!(results[1].snippet.is_empty());
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(parse_results(PAGE, 2).len(), 2);
    }

    #[test]
    fn no_results_in_unrelated_html() {
        assert!(parse_results("<html><body>nothing</body></html>", 5).is_empty());
    }

    #[test]
    fn formats_into_one_block() {
        let text = format_results(&parse_results(PAGE, 2));
        assert_eq!(
            text,
            "Apple Pie & More: The best apple pie recipe. (https://example.com/pie)\n\
             Apple Tart (https://example.org/tart)"
        );
    }
}
