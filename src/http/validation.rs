//! Request Validation
//!
//! Admission checks for the research endpoints: query shape and content,
//! mode parsing, canonical UUID path parameters, and history paging clamps.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::ResearchMode;
use crate::utils::error::{AppError, AppResult};

pub const QUERY_MIN_LEN: usize = 3;
pub const QUERY_MAX_LEN: usize = 2000;

pub const HISTORY_DEFAULT_LIMIT: u32 = 50;
pub const HISTORY_MAX_LIMIT: u32 = 100;

/// Queries matching any of these are rejected outright.
fn injection_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"(?i)<script", r"(?i)javascript:", r"(?i)on\w+="]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("valid UUID pattern")
    })
}

/// Validate a research-start body: `query` present and well-formed, `mode`
/// in the known set (defaulting to standard).
pub fn validate_research_request(body: &serde_json::Value) -> AppResult<(String, ResearchMode)> {
    let query_value = body
        .get("query")
        .filter(|v| !v.is_null())
        .ok_or_else(|| AppError::validation("query is required"))?;
    let raw = query_value
        .as_str()
        .ok_or_else(|| AppError::validation("query must be a string"))?;

    let query = raw.trim();
    let length = query.chars().count();
    if length < QUERY_MIN_LEN {
        return Err(AppError::validation(format!(
            "query must be at least {} characters",
            QUERY_MIN_LEN
        )));
    }
    if length > QUERY_MAX_LEN {
        return Err(AppError::validation(format!(
            "query must be at most {} characters",
            QUERY_MAX_LEN
        )));
    }
    if injection_patterns().iter().any(|rx| rx.is_match(query)) {
        return Err(AppError::validation("query contains disallowed content"));
    }

    let mode = match body.get("mode").filter(|v| !v.is_null()) {
        None => ResearchMode::Standard,
        Some(value) => value
            .as_str()
            .and_then(ResearchMode::parse)
            .ok_or_else(|| {
                AppError::validation("mode must be one of: quick, standard, deep")
            })?,
    };

    Ok((query.to_string(), mode))
}

/// Path ids must be canonical 8-4-4-4-12 hex UUIDs.
pub fn validate_session_id(id: &str) -> AppResult<()> {
    if uuid_pattern().is_match(id) {
        Ok(())
    } else {
        Err(AppError::validation("id must be a canonical UUID"))
    }
}

/// Clamp the history page size into [1, 100], defaulting to 50.
pub fn clamp_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .map(|v| v.clamp(1, HISTORY_MAX_LIMIT as i64) as u32)
        .unwrap_or(HISTORY_DEFAULT_LIMIT)
}

/// Clamp the history offset to ≥ 0, defaulting to 0.
pub fn clamp_offset(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .map(|v| v.max(0) as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(query: &str, mode: Option<&str>) -> serde_json::Value {
        match mode {
            Some(m) => serde_json::json!({ "query": query, "mode": m }),
            None => serde_json::json!({ "query": query }),
        }
    }

    #[test]
    fn test_query_length_boundaries() {
        assert!(validate_research_request(&body("ab", None)).is_err());
        assert!(validate_research_request(&body("abc", None)).is_ok());
        let long = "x".repeat(2000);
        assert!(validate_research_request(&body(&long, None)).is_ok());
        let too_long = "x".repeat(2001);
        assert!(validate_research_request(&body(&too_long, None)).is_err());
    }

    #[test]
    fn test_query_is_trimmed_before_length_check() {
        assert!(validate_research_request(&body("  ab  ", None)).is_err());
        let (query, _) = validate_research_request(&body("  abc  ", None)).unwrap();
        assert_eq!(query, "abc");
    }

    #[test]
    fn test_query_must_be_present_string() {
        assert!(validate_research_request(&serde_json::json!({})).is_err());
        assert!(validate_research_request(&serde_json::json!({ "query": 42 })).is_err());
        assert!(validate_research_request(&serde_json::json!({ "query": null })).is_err());
    }

    #[test]
    fn test_injection_patterns_rejected() {
        for query in [
            "<script>alert(1)</script> stuff",
            "look at JAVASCRIPT:void(0)",
            "x onload=evil() y",
        ] {
            assert!(
                validate_research_request(&body(query, None)).is_err(),
                "accepted: {}",
                query
            );
        }
    }

    #[test]
    fn test_mode_defaults_to_standard() {
        let (_, mode) = validate_research_request(&body("valid query", None)).unwrap();
        assert_eq!(mode, ResearchMode::Standard);
    }

    #[test]
    fn test_mode_parsing() {
        let (_, mode) = validate_research_request(&body("valid query", Some("deep"))).unwrap();
        assert_eq!(mode, ResearchMode::Deep);
        assert!(validate_research_request(&body("valid query", Some("turbo"))).is_err());
    }

    #[test]
    fn test_session_id_must_be_canonical_uuid() {
        assert!(validate_session_id("8c5f57e4-9f0e-4a39-9d0b-3a8cbb3a21c5").is_ok());
        assert!(validate_session_id("8C5F57E4-9F0E-4A39-9D0B-3A8CBB3A21C5").is_ok());
        assert!(validate_session_id("not-a-uuid").is_err());
        assert!(validate_session_id("8c5f57e49f0e4a399d0b3a8cbb3a21c5").is_err());
        assert!(validate_session_id("").is_err());
    }

    #[test]
    fn test_paging_clamps() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some("0")), 1);
        assert_eq!(clamp_limit(Some("500")), 100);
        assert_eq!(clamp_limit(Some("25")), 25);
        assert_eq!(clamp_limit(Some("nope")), 50);

        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some("-5")), 0);
        assert_eq!(clamp_offset(Some("10")), 10);
    }
}
