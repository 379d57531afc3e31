//! Resource request strings.
//!
//! A request is a resource path with an optional query suffix, e.g.
//! `./pages/index?isFirst=true&root=pkg-a`. Queries carry per-reference
//! flags (first page, sub-package root, independent init module, local
//! source mode) between resolution stages without mutating shared state.

use std::collections::BTreeMap;

/// Parsed query parameters, ordered for stable serialization.
pub type Query = BTreeMap<String, String>;

/// A request split into its resource path and query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedRequest {
    pub resource_path: String,
    pub query: Query,
}

impl ParsedRequest {
    /// Whether a query flag is present and not explicitly `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        match self.query.get(key) {
            Some(v) => v != "false",
            None => false,
        }
    }
}

/// Split a request into `(resource_path, query)`.
#[must_use]
pub fn parse_request(request: &str) -> ParsedRequest {
    let Some((path, raw_query)) = request.split_once('?') else {
        return ParsedRequest {
            resource_path: request.to_string(),
            query: Query::new(),
        };
    };
    let mut query = Query::new();
    for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((k, v)) => query.insert(k.to_string(), v.to_string()),
            // Bare keys are boolean flags
            None => query.insert(pair.to_string(), "true".to_string()),
        };
    }
    ParsedRequest {
        resource_path: path.to_string(),
        query,
    }
}

/// Append query parameters to a request, merging with any existing query.
///
/// Existing keys are kept; incoming values only fill gaps, matching how
/// reference-site flags must not override resource-local overrides.
#[must_use]
pub fn add_query(request: &str, extra: &Query) -> String {
    let mut parsed = parse_request(request);
    for (k, v) in extra {
        parsed.query.entry(k.clone()).or_insert_with(|| v.clone());
    }
    stringify_request(&parsed)
}

/// Rebuild a request string from its parsed form.
#[must_use]
pub fn stringify_request(parsed: &ParsedRequest) -> String {
    if parsed.query.is_empty() {
        return parsed.resource_path.clone();
    }
    let query = parsed
        .query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", parsed.resource_path, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path() {
        let parsed = parse_request("/src/pages/index");
        assert_eq!(parsed.resource_path, "/src/pages/index");
        assert!(parsed.query.is_empty());
    }

    #[test]
    fn test_parse_query_and_flags() {
        let parsed = parse_request("./pkg?root=sub-a&independent&mode=ali");
        assert_eq!(parsed.resource_path, "./pkg");
        assert_eq!(parsed.query.get("root").map(String::as_str), Some("sub-a"));
        assert!(parsed.flag("independent"));
        assert_eq!(parsed.query.get("mode").map(String::as_str), Some("ali"));
        assert!(!parsed.flag("isFirst"));
    }

    #[test]
    fn test_add_query_does_not_override() {
        let mut extra = Query::new();
        extra.insert("mode".to_string(), "wx".to_string());
        extra.insert("isFirst".to_string(), "true".to_string());

        let out = add_query("./page?mode=ali", &extra);
        let parsed = parse_request(&out);
        assert_eq!(parsed.query.get("mode").map(String::as_str), Some("ali"));
        assert!(parsed.flag("isFirst"));
    }

    #[test]
    fn test_stringify_roundtrip() {
        let parsed = parse_request("./a?x=1&y=2");
        assert_eq!(stringify_request(&parsed), "./a?x=1&y=2");
    }
}
