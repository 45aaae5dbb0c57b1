//! Conditional request evaluation (RFC 7232) and ETag generation.
//!
//! `evaluate_conditional` implements the precedence RFC 7232 mandates:
//! `If-Match` first, then `If-Unmodified-Since`, then `If-None-Match`, then
//! `If-Modified-Since`. Each step can short-circuit the remaining ones.

use base64::Engine;
use chrono_lite::HttpDate;
use http::{HeaderMap, Method};
use sha2::{Digest, Sha256};

/// An opaque validator for a response representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag {
    pub value: String,
    pub weak: bool,
}

impl ETag {
    pub fn strong(value: impl Into<String>) -> Self {
        Self { value: value.into(), weak: false }
    }

    pub fn weak(value: impl Into<String>) -> Self {
        Self { value: value.into(), weak: true }
    }

    /// Parse a single `ETag`-style token, e.g. `W/"abc"` or `"abc"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("W/") {
            Some(Self::weak(unquote(rest)))
        } else if raw == "*" {
            Some(Self { value: "*".to_string(), weak: false })
        } else {
            Some(Self::strong(unquote(raw)))
        }
    }

    /// Strong comparison: both validators must be strong and byte-equal.
    pub fn strong_eq(&self, other: &ETag) -> bool {
        !self.weak && !other.weak && self.value == other.value
    }

    /// Weak comparison: values equal regardless of weak/strong tagging.
    pub fn weak_eq(&self, other: &ETag) -> bool {
        self.value == other.value
    }

    pub fn to_header_value(&self) -> String {
        if self.weak {
            format!("W/\"{}\"", self.value)
        } else {
            format!("\"{}\"", self.value)
        }
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

fn parse_list(header: &str) -> Vec<ETag> {
    header
        .split(',')
        .filter_map(|tok| ETag::parse(tok.trim()))
        .collect()
}

/// How a response derives its default `ETag` from its body, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EtagStrategy {
    #[default]
    Disabled,
    Strong,
    Weak,
}

impl EtagStrategy {
    /// Compute the default ETag for a byte body under this strategy.
    /// `Disabled` yields `None`.
    pub fn resolve(self, body: &[u8]) -> Option<ETag> {
        match self {
            EtagStrategy::Disabled => None,
            EtagStrategy::Strong => Some(ETag::strong(digest(body))),
            EtagStrategy::Weak => Some(ETag::weak(digest(body))),
        }
    }
}

fn digest(body: &[u8]) -> String {
    let hash = Sha256::digest(body);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
}

/// The result of evaluating the conditional headers against a representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalOutcome {
    /// No conditional header applied, or all of them passed: render normally.
    Proceed,
    /// `If-None-Match`/`If-Modified-Since` matched on a safe method.
    NotModified,
    /// A precondition failed.
    PreconditionFailed,
}

/// Evaluate the standard conditional-request headers against the current
/// representation's validators, following RFC 7232 §6 precedence.
pub fn evaluate_conditional(
    method: &Method,
    headers: &HeaderMap,
    current_etag: Option<&ETag>,
    last_modified: Option<&HttpDate>,
) -> ConditionalOutcome {
    let safe = matches!(*method, Method::GET | Method::HEAD);

    // Step 1: If-Match
    if let Some(if_match) = headers.get("if-match").and_then(|v| v.to_str().ok()) {
        let wants_any = if_match.trim() == "*";
        let matched = if wants_any {
            current_etag.is_some()
        } else {
            let candidates = parse_list(if_match);
            match current_etag {
                Some(etag) => candidates.iter().any(|c| c.strong_eq(etag)),
                None => false,
            }
        };
        if !matched {
            return ConditionalOutcome::PreconditionFailed;
        }
    }

    // Step 2: If-Unmodified-Since
    if let Some(raw) = headers.get("if-unmodified-since").and_then(|v| v.to_str().ok()) {
        if let (Some(provided), Some(current)) = (HttpDate::parse(raw), last_modified) {
            if current.0 > provided.0 {
                return ConditionalOutcome::PreconditionFailed;
            }
        }
    }

    // Step 3: If-None-Match
    if let Some(if_none_match) = headers.get("if-none-match").and_then(|v| v.to_str().ok()) {
        let wants_any = if_none_match.trim() == "*";
        let matched = if wants_any {
            current_etag.is_some()
        } else {
            let candidates = parse_list(if_none_match);
            match current_etag {
                Some(etag) => candidates.iter().any(|c| c.weak_eq(etag)),
                None => false,
            }
        };
        if matched {
            return if safe {
                ConditionalOutcome::NotModified
            } else {
                ConditionalOutcome::PreconditionFailed
            };
        }
        return ConditionalOutcome::Proceed;
    }

    // Step 4: If-Modified-Since (only for safe methods, only when If-None-Match absent)
    if safe {
        if let Some(raw) = headers.get("if-modified-since").and_then(|v| v.to_str().ok()) {
            if let (Some(provided), Some(current)) = (HttpDate::parse(raw), last_modified) {
                if current.0 <= provided.0 {
                    return ConditionalOutcome::NotModified;
                }
            }
        }
    }

    ConditionalOutcome::Proceed
}

/// A tiny RFC 7231 `HTTP-date` wrapper so this crate doesn't need a full
/// chrono dependency just to compare two instants for conditional requests.
/// Stored as seconds since the Unix epoch.
pub mod chrono_lite {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub struct HttpDate(pub i64);

    impl HttpDate {
        pub fn from_unix(seconds: i64) -> Self {
            Self(seconds)
        }

        /// Parses the IMF-fixdate form Anvil emits (`Thu, 01 Jan 1970 00:00:00 GMT`).
        /// Other RFC 7231 forms (RFC 850, asctime) are not accepted on input,
        /// matching the RECOMMENDED-strictness posture most servers take.
        pub fn parse(raw: &str) -> Option<Self> {
            let time = httpdate::parse_http_date(raw.trim()).ok()?;
            let secs = time.duration_since(std::time::UNIX_EPOCH).ok()?.as_secs();
            Some(Self(secs as i64))
        }

        pub fn to_header_value(self) -> String {
            let time = std::time::UNIX_EPOCH + std::time::Duration::from_secs(self.0.max(0) as u64);
            httpdate::fmt_http_date(time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_lite::HttpDate;
    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn etag_parse_roundtrips_strong_and_weak() {
        assert_eq!(ETag::parse("\"abc\""), Some(ETag::strong("abc")));
        assert_eq!(ETag::parse("W/\"abc\""), Some(ETag::weak("abc")));
        assert_eq!(ETag::strong("abc").to_header_value(), "\"abc\"");
        assert_eq!(ETag::weak("abc").to_header_value(), "W/\"abc\"");
    }

    #[test]
    fn strong_eq_rejects_weak_validators() {
        let strong = ETag::strong("v1");
        let weak = ETag::weak("v1");
        assert!(!strong.strong_eq(&weak));
        assert!(strong.weak_eq(&weak));
    }

    #[test]
    fn etag_round_trip_matches_not_modified() {
        // Testable property #4: resolving the same strategy/body and feeding
        // it back as If-None-Match always yields NotModified.
        let body = b"hello";
        let etag = EtagStrategy::Strong.resolve(body).unwrap();
        let hdrs = headers(&[("if-none-match", &etag.to_header_value())]);
        let outcome = evaluate_conditional(&Method::GET, &hdrs, Some(&etag), None);
        assert_eq!(outcome, ConditionalOutcome::NotModified);
    }

    #[test]
    fn mismatched_etag_proceeds() {
        let body = b"hello";
        let etag = EtagStrategy::Strong.resolve(body).unwrap();
        let hdrs = headers(&[("if-none-match", "\"some-other-value\"")]);
        let outcome = evaluate_conditional(&Method::GET, &hdrs, Some(&etag), None);
        assert_eq!(outcome, ConditionalOutcome::Proceed);
    }

    #[test]
    fn if_match_wildcard_requires_representation() {
        let hdrs = headers(&[("if-match", "*")]);
        assert_eq!(
            evaluate_conditional(&Method::PUT, &hdrs, None, None),
            ConditionalOutcome::PreconditionFailed
        );
        let etag = ETag::strong("v1");
        assert_eq!(
            evaluate_conditional(&Method::PUT, &hdrs, Some(&etag), None),
            ConditionalOutcome::Proceed
        );
    }

    #[test]
    fn if_match_failure_precedes_if_none_match() {
        // If-Match is evaluated first per RFC 7232 §6, even when
        // If-None-Match would otherwise have passed.
        let current = ETag::strong("v2");
        let hdrs = headers(&[("if-match", "\"v1\""), ("if-none-match", "\"v2\"")]);
        assert_eq!(
            evaluate_conditional(&Method::GET, &hdrs, Some(&current), None),
            ConditionalOutcome::PreconditionFailed
        );
    }

    #[test]
    fn if_none_match_on_unsafe_method_yields_precondition_failed() {
        let current = ETag::strong("v1");
        let hdrs = headers(&[("if-none-match", "\"v1\"")]);
        assert_eq!(
            evaluate_conditional(&Method::POST, &hdrs, Some(&current), None),
            ConditionalOutcome::PreconditionFailed
        );
    }

    #[test]
    fn if_unmodified_since_fails_when_representation_is_newer() {
        let current = HttpDate::from_unix(2_000);
        let provided = HttpDate::from_unix(1_000).to_header_value();
        let hdrs = headers(&[("if-unmodified-since", &provided)]);
        assert_eq!(
            evaluate_conditional(&Method::PUT, &hdrs, None, Some(&current)),
            ConditionalOutcome::PreconditionFailed
        );
    }

    #[test]
    fn if_modified_since_only_applies_to_safe_methods() {
        let current = HttpDate::from_unix(1_000);
        let provided = HttpDate::from_unix(1_000).to_header_value();
        let hdrs = headers(&[("if-modified-since", &provided)]);

        assert_eq!(
            evaluate_conditional(&Method::GET, &hdrs, None, Some(&current)),
            ConditionalOutcome::NotModified
        );
        // Same header on a POST is simply ignored; step 4 is GET/HEAD-only.
        assert_eq!(
            evaluate_conditional(&Method::POST, &hdrs, None, Some(&current)),
            ConditionalOutcome::Proceed
        );
    }

    #[test]
    fn http_date_parse_rejects_garbage() {
        assert_eq!(HttpDate::parse("not a date"), None);
    }
}
