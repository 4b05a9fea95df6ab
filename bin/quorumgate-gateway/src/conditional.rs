//! Conditional-request evaluator (§4.4): `If-Match` / `If-None-Match` /
//! `If-Modified-Since` / `If-Unmodified-Since` against a resource's current
//! etag and mtime. This module only evaluates the policy block; callers
//! supply the resource's current state and read the request's own headers.

use axum::http::{HeaderMap, Method};
use quorumgate_common::Error as CoreError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Outcome of evaluating the conditional headers against a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionalOutcome {
    Proceed,
    NotModified,
    /// Carries the name of the header that rejected the request, so callers
    /// can report it instead of a hardcoded one.
    PreconditionFailed(&'static str),
}

/// One candidate from a comma-separated etag list, with its weak/strong tag.
struct EtagCandidate<'a> {
    tag: &'a str,
    is_weak: bool,
}

fn parse_etag_candidate(raw: &str) -> EtagCandidate<'_> {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("W/") {
        Some(rest) => EtagCandidate {
            tag: rest.trim().trim_matches('"'),
            is_weak: true,
        },
        None => EtagCandidate {
            tag: trimmed.trim_matches('"'),
            is_weak: false,
        },
    }
}

fn parse_etag_list(value: &str) -> Vec<EtagCandidate<'_>> {
    value.split(',').map(parse_etag_candidate).collect()
}

/// Strong comparison (RFC 7232 §2.3.2): two entity tags match only if
/// neither is weak and their opaque values are identical.
fn strong_matches(candidates: &[EtagCandidate<'_>], etag: &str) -> bool {
    candidates.iter().any(|c| !c.is_weak && c.tag == etag)
}

/// Weak comparison: opaque values identical regardless of the weak marker.
fn weak_matches(candidates: &[EtagCandidate<'_>], etag: &str) -> bool {
    candidates.iter().any(|c| c.tag == etag)
}

fn parse_http_date(value: &str) -> Result<SystemTime, CoreError> {
    httpdate::parse_http_date(value.trim()).map_err(|_| CoreError::BadRequest(format!("malformed HTTP date: {value}")))
}

/// Evaluates `If-Match`, `If-None-Match`, `If-Modified-Since`, and
/// `If-Unmodified-Since` against `current` (the resource's observed etag and
/// mtime, or `None` if the resource does not currently exist).
///
/// # Errors
/// Returns [`CoreError::BadRequest`] if a date header fails to parse.
pub fn evaluate(
    headers: &HeaderMap,
    method: &Method,
    current_etag: Option<&str>,
    current_mtime_ms: Option<u64>,
) -> Result<ConditionalOutcome, CoreError> {
    let safe_method = matches!(*method, Method::GET | Method::HEAD);

    if let Some(raw) = header_str(headers, "if-match") {
        let exists = current_etag.is_some();
        // Strong comparison (§4.4): a weak `W/` candidate is never a match,
        // even if its opaque value equals the current etag.
        let matched = raw.trim() == "*" && exists
            || current_etag.is_some_and(|etag| strong_matches(&parse_etag_list(raw), etag));
        if !matched {
            return Ok(ConditionalOutcome::PreconditionFailed("if-match"));
        }
    }

    if let (Some(raw), Some(mtime)) = (header_str(headers, "if-unmodified-since"), current_mtime_ms) {
        let since = parse_http_date(raw)?;
        let current = UNIX_EPOCH + Duration::from_millis(mtime);
        if current > since {
            return Ok(ConditionalOutcome::PreconditionFailed("if-unmodified-since"));
        }
    }

    if let Some(raw) = header_str(headers, "if-none-match") {
        let exists = current_etag.is_some();
        let matched = raw.trim() == "*" && exists
            || current_etag.is_some_and(|etag| weak_matches(&parse_etag_list(raw), etag));
        if matched {
            return Ok(if safe_method {
                ConditionalOutcome::NotModified
            } else {
                ConditionalOutcome::PreconditionFailed("if-none-match")
            });
        }
    } else if let (Some(raw), Some(mtime), true) = (header_str(headers, "if-modified-since"), current_mtime_ms, safe_method)
    {
        let since = parse_http_date(raw)?;
        let current = UNIX_EPOCH + Duration::from_millis(mtime);
        if current <= since {
            return Ok(ConditionalOutcome::NotModified);
        }
    }

    Ok(ConditionalOutcome::Proceed)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
