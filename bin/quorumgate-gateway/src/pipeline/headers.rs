//! Request-header parsing shared by the PUT, GET, and MPU handlers.

use axum::http::HeaderMap;
use quorumgate_common::Error as CoreError;
use std::collections::HashMap;

/// Durability level (`Durability-Level`, alias `x-durability-level`). Per the
/// source's documented ambiguity (§9 open questions), the non-prefixed header
/// wins when both are present.
pub fn durability_level(headers: &HeaderMap) -> Result<Option<u32>, CoreError> {
    let raw = header_str(headers, "durability-level").or_else(|| header_str(headers, "x-durability-level"));
    let Some(raw) = raw else { return Ok(None) };
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| CoreError::BadRequest(format!("invalid durability-level: {raw}")))
}

/// `m-*` passthrough custom headers, keys lowercased with the `m-` prefix kept
/// (matching the wire convention), values copied verbatim.
pub fn custom_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().to_lowercase();
            if name.starts_with("m-") {
                value.to_str().ok().map(|v| (name, v.to_string()))
            } else {
                None
            }
        })
        .collect()
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn header_u64(headers: &HeaderMap, name: &str) -> Result<Option<u64>, CoreError> {
    let Some(raw) = header_str(headers, name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| CoreError::BadRequest(format!("invalid {name}: {raw}")))
}

/// Normalizes a requested replica count into `[1, max_copies]`, per §4.5 step 3.
///
/// # Errors
/// Returns [`CoreError::InvalidDurabilityLevel`] if an explicit value falls
/// outside the bound.
pub fn normalize_copies(requested: Option<u32>, max_copies: u32) -> Result<u32, CoreError> {
    match requested {
        None => Ok(2.min(max_copies).max(1)),
        Some(copies) if (1..=max_copies).contains(&copies) => Ok(copies),
        Some(copies) => Err(CoreError::InvalidDurabilityLevel {
            copies,
            min: 1,
            max: max_copies,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(), HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn test_durability_level_prefers_non_prefixed() {
        let headers = headers_with(&[("durability-level", "3"), ("x-durability-level", "5")]);
        assert_eq!(durability_level(&headers).unwrap(), Some(3));
    }

    #[test]
    fn test_durability_level_falls_back_to_alias() {
        let headers = headers_with(&[("x-durability-level", "5")]);
        assert_eq!(durability_level(&headers).unwrap(), Some(5));
    }

    #[test]
    fn test_custom_headers_filters_m_prefix() {
        let headers = headers_with(&[("m-custom", "value"), ("content-type", "text/plain")]);
        let custom = custom_headers(&headers);
        assert_eq!(custom.get("m-custom"), Some(&"value".to_string()));
        assert!(!custom.contains_key("content-type"));
    }

    #[test]
    fn test_normalize_copies_rejects_out_of_range() {
        assert!(normalize_copies(Some(0), 9).is_err());
        assert!(normalize_copies(Some(10), 9).is_err());
        assert_eq!(normalize_copies(Some(3), 9).unwrap(), 3);
        assert_eq!(normalize_copies(None, 9).unwrap(), 2);
    }
}
