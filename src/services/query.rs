// src/services/query.rs

//! Query language parser.
//!
//! A raw query looks like `[chat/]include+words[:exclude+words][?code=..&km=..&min=..&max=..]`.
//! The chat prefix is optional and overrides the requester's default chat.
//! Inside an include word, `&` joins a phrase: `iphone+12&pro` requires both
//! `iphone` and `12 pro` to appear, and sends `iphone+12+pro` to the API.

use std::collections::BTreeSet;

use url::form_urlencoded;

use crate::error::{AppError, Result};
use crate::models::{ParsedQuery, SearchSpec};

/// Parameter keys understood in the `?` section.
const PARAM_CODE: &str = "code";
const PARAM_KM: &str = "km";
const PARAM_MIN: &str = "min";
const PARAM_MAX: &str = "max";

/// Parse a raw query into its canonical id and structured search spec.
pub fn parse_query(raw: &str, default_chat: &str) -> Result<ParsedQuery> {
    let (chat, query) = raw.split_once('/').unwrap_or((default_chat, raw));

    let chat = chat.trim().to_lowercase();
    let query = query.trim().replace(' ', "+").to_lowercase();

    let spec = parse_spec(&query).map_err(|message| AppError::parse(raw.trim(), message))?;

    Ok(ParsedQuery {
        id: format!("{chat}/{query}"),
        chat,
        query,
        spec,
    })
}

/// Parse a normalized query string (no chat prefix).
fn parse_spec(query: &str) -> std::result::Result<SearchSpec, String> {
    let (terms, params) = match query.split_once('?') {
        Some((terms, params)) => (terms, Some(params)),
        None => (query, None),
    };

    let mut spec = SearchSpec::default();

    if let Some(params) = params {
        let values = decode_params(params)?;
        spec.area_code = int_param(&values, PARAM_CODE)?;
        spec.radius_km = int_param(&values, PARAM_KM)?;
        spec.min_price = int_param(&values, PARAM_MIN)?;
        spec.max_price = int_param(&values, PARAM_MAX)?;
    }

    let (include, exclude) = terms.split_once(':').unwrap_or((terms, ""));

    spec.include_terms = split_terms(include)
        .map(|term| term.replace('&', " "))
        .collect();
    spec.exclude_terms = split_terms(exclude).map(str::to_string).collect::<BTreeSet<_>>();
    spec.keywords = include.replace('&', "+");

    Ok(spec)
}

fn split_terms(section: &str) -> impl Iterator<Item = &str> {
    section
        .split('+')
        .map(str::trim)
        .filter(|term| !term.is_empty())
}

/// Decode an `application/x-www-form-urlencoded` fragment, rejecting bad escapes.
fn decode_params(params: &str) -> std::result::Result<Vec<(String, String)>, String> {
    if params.contains(';') {
        return Err(format!("invalid separator ';' in '{params}'"));
    }

    let bytes = params.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b != b'%' {
            continue;
        }
        let valid = bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(format!("invalid escape in '{params}'"));
        }
    }

    Ok(form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

/// First value of `key` as a positive integer; missing, empty or <= 0 means unset.
fn int_param(values: &[(String, String)], key: &str) -> std::result::Result<Option<u32>, String> {
    let Some((_, raw)) = values.iter().find(|(k, _)| k == key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let value: i64 = raw
        .parse()
        .map_err(|_| format!("couldn't parse int {raw} for {key}"))?;
    if value <= 0 {
        return Ok(None);
    }
    u32::try_from(value)
        .map(Some)
        .map_err(|_| format!("value {raw} for {key} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_full_query() {
        let parsed = parse_query("foo+bar:baz?min=10&max=20", "chat1").unwrap();

        assert_eq!(parsed.chat, "chat1");
        assert_eq!(parsed.id, "chat1/foo+bar:baz?min=10&max=20");
        assert_eq!(parsed.spec.include_terms, set(&["foo", "bar"]));
        assert_eq!(parsed.spec.exclude_terms, set(&["baz"]));
        assert_eq!(parsed.spec.min_price, Some(10));
        assert_eq!(parsed.spec.max_price, Some(20));
        assert_eq!(parsed.spec.area_code, None);
        assert_eq!(parsed.spec.keywords, "foo+bar");
    }

    #[test]
    fn test_chat_prefix_overrides_default() {
        let parsed = parse_query("@Deals/ Nintendo Switch ", "12345").unwrap();

        assert_eq!(parsed.chat, "@deals");
        assert_eq!(parsed.query, "nintendo+switch");
        assert_eq!(parsed.id, "@deals/nintendo+switch");
        assert_eq!(parsed.spec.include_terms, set(&["nintendo", "switch"]));
    }

    #[test]
    fn test_phrase_separator() {
        let parsed = parse_query("iphone+12&pro", "c").unwrap();

        assert_eq!(parsed.spec.include_terms, set(&["iphone", "12 pro"]));
        assert_eq!(parsed.spec.keywords, "iphone+12+pro");
    }

    #[test]
    fn test_geo_params() {
        let parsed = parse_query("bike?code=28001&km=15", "c").unwrap();

        assert_eq!(parsed.spec.area_code, Some(28001));
        assert_eq!(parsed.spec.radius_km, Some(15));
    }

    #[test]
    fn test_non_integer_param_fails() {
        let err = parse_query("foo?min=cheap", "c").unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));

        assert!(parse_query("foo?code=28O01", "c").is_err());
    }

    #[test]
    fn test_bad_escape_fails() {
        assert!(parse_query("foo?min=%zz", "c").is_err());
        assert!(parse_query("foo?min=1;max=2", "c").is_err());
    }

    #[test]
    fn test_unknown_and_non_positive_params_ignored() {
        let parsed = parse_query("foo?color=red&min=0&max=-5", "c").unwrap();

        assert_eq!(parsed.spec.min_price, None);
        assert_eq!(parsed.spec.max_price, None);
    }

    #[test]
    fn test_empty_keywords_are_legal() {
        let parsed = parse_query("?min=10", "c").unwrap();

        assert!(parsed.spec.is_filter_only());
        assert_eq!(parsed.spec.min_price, Some(10));
    }

    #[test]
    fn test_case_folding_gives_same_id() {
        let a = parse_query("Chat1/PlayStation+5", "x").unwrap();
        let b = parse_query("chat1/playstation+5", "x").unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_wildcard() {
        let parsed = parse_query("*", "chat1").unwrap();
        assert!(parsed.is_wildcard());
        assert_eq!(parsed.id, "chat1/*");
    }
}
