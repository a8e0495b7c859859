//! Source URL normalization and extraction from arbitrary nested JSON.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// A URL that has passed through [`normalize`]. Can only be constructed via
/// the normalizer — parse, don't validate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NormalizedSource(String);

impl NormalizedSource {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<NormalizedSource> for String {
    fn from(s: NormalizedSource) -> Self {
        s.0
    }
}

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', ']', '}', '>', '"', '\''];

/// Strip surrounding whitespace and a trailing punctuation class, prefix
/// `www.`-leading hosts with `https://`, then reject anything that still
/// doesn't start with `http(s)://`.
pub fn normalize(raw: &str) -> Option<NormalizedSource> {
    let trimmed = raw.trim().trim_end_matches(TRAILING_PUNCTUATION);
    let candidate = if trimmed.starts_with("www.") {
        format!("https://{trimmed}")
    } else {
        trimmed.to_string()
    };
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        Some(NormalizedSource(candidate))
    } else {
        None
    }
}

/// Accumulates normalized sources, deduping by exact string and preserving
/// first-seen order.
#[derive(Debug, Clone, Default)]
pub struct SourceCollector {
    seen: std::collections::HashSet<String>,
    ordered: Vec<NormalizedSource>,
}

impl SourceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and add `raw` if it's a valid source and not already present.
    pub fn add(&mut self, raw: &str) {
        if let Some(normalized) = normalize(raw) {
            if self.seen.insert(normalized.as_str().to_string()) {
                self.ordered.push(normalized);
            }
        }
    }

    pub fn into_vec(self) -> Vec<NormalizedSource> {
        self.ordered
    }

    pub fn as_slice(&self) -> &[NormalizedSource] {
        &self.ordered
    }
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>\[\]{}"']+"#).expect("static url regex"))
}

/// Recursively scan a JSON value for URL-bearing fields: `url`, `href`,
/// `source`, `url_citation.url`, or any string containing an `https?://`
/// substring. Used to harvest citations out of arbitrary, provider-specific
/// search-result shapes.
pub fn extract_urls(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    walk(value, &mut found);
    found
}

fn walk(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for key in ["url", "href", "source"] {
                if let Some(Value::String(s)) = map.get(key) {
                    found.push(s.clone());
                }
            }
            if let Some(Value::Object(citation)) = map.get("url_citation") {
                if let Some(Value::String(s)) = citation.get("url") {
                    found.push(s.clone());
                }
            }
            for v in map.values() {
                walk(v, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, found);
            }
        }
        Value::String(s) => {
            for m in url_regex().find_iter(s) {
                found.push(m.as_str().to_string());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_www_host() {
        let n = normalize("www.example.com/report").unwrap();
        assert_eq!(n.as_str(), "https://www.example.com/report");
    }

    #[test]
    fn strips_trailing_punctuation_and_whitespace() {
        let n = normalize("  https://example.com/a).  ").unwrap();
        assert_eq!(n.as_str(), "https://example.com/a");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(normalize("ftp://example.com").is_none());
        assert!(normalize("not a url at all").is_none());
    }

    #[test]
    fn collector_dedups_preserving_first_seen_order() {
        let mut c = SourceCollector::new();
        c.add("https://b.example.com");
        c.add("https://a.example.com");
        c.add("https://b.example.com.");
        let urls: Vec<String> = c.into_vec().into_iter().map(String::from).collect();
        assert_eq!(urls, vec!["https://b.example.com", "https://a.example.com"]);
    }

    #[test]
    fn extracts_urls_from_nested_result_shapes() {
        let value = json!({
            "results": [
                {"title": "A", "url": "https://a.example.com"},
                {"title": "B", "url_citation": {"url": "https://b.example.com"}},
                {"title": "C", "snippet": "see https://c.example.com/path for details"},
            ]
        });
        let urls = extract_urls(&value);
        assert!(urls.contains(&"https://a.example.com".to_string()));
        assert!(urls.contains(&"https://b.example.com".to_string()));
        assert!(urls.iter().any(|u| u.starts_with("https://c.example.com")));
    }
}
