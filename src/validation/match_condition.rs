//! Match condition resolver.

use lazy_static::lazy_static;
use regex::Regex;

use crate::domain::{AffinityTtl, MatchCondition, MatchField};

use super::error::{ErrorKind, FieldError, IssueCollector};
use super::primitives::{
    parse_duration_secs, validate_hostname, validate_http_method, validate_match_field,
    validate_path_prefix, MAX_AFFINITY_TTL_SECS,
};
use super::requests::MatchConditionPayload;

lazy_static! {
    /// Cookie names are RFC 6265 tokens
    static ref COOKIE_NAME_REGEX: Regex = Regex::new(r"^[!#$%&'*+.^_`|~0-9A-Za-z-]+$").unwrap();
}

/// Validate and canonicalize one match condition.
///
/// Issues are recorded relative to the collector's current path. Returns
/// `None` when any issue was found.
pub fn resolve_match_condition(
    issues: &mut IssueCollector,
    payload: &MatchConditionPayload,
) -> Option<MatchCondition> {
    let before = issues.issue_count();

    let hostname = if payload.hostname.trim().is_empty() {
        Some(String::new())
    } else {
        issues.check("hostname", validate_hostname(&payload.hostname, true))
    };

    let match_field = issues.check("match_field", validate_match_field(&payload.match_field));
    let match_value = match match_field {
        Some(field) => issues.check("match_value", canonical_match_value(field, &payload.match_value)),
        None => None,
    };

    let affinity = issues.check(
        "affinity_cookie",
        resolve_affinity(payload.affinity_cookie.as_deref(), payload.affinity_ttl.as_deref()),
    );

    if issues.issue_count() > before {
        return None;
    }

    let (affinity_cookie, affinity_ttl) = affinity?;
    Some(MatchCondition {
        hostname: hostname?,
        match_field: match_field?,
        match_value: match_value?,
        affinity_cookie,
        affinity_ttl,
    })
}

/// Canonical form of `match_value` for the given field. Header and query
/// values are opaque beyond being non-empty.
pub fn canonical_match_value(field: MatchField, value: &str) -> Result<String, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::required(format!("match_value cannot be empty for {}", field)));
    }

    match field {
        MatchField::PathPrefix => validate_path_prefix(value),
        MatchField::Method => validate_http_method(value),
        MatchField::Host => validate_hostname(value, true),
        MatchField::Query | MatchField::Header => Ok(value.to_string()),
    }
}

/// Cookie and TTL are all-or-nothing. Blank strings count as absent.
pub fn resolve_affinity(
    cookie: Option<&str>,
    ttl: Option<&str>,
) -> Result<(Option<String>, Option<AffinityTtl>), FieldError> {
    let cookie = cookie.map(str::trim).filter(|c| !c.is_empty());
    let ttl = ttl.map(str::trim).filter(|t| !t.is_empty());

    match (cookie, ttl) {
        (None, None) => Ok((None, None)),
        (Some(cookie), None) => Err(FieldError::new(
            ErrorKind::AffinityConfig,
            format!("affinity_cookie '{}' requires affinity_ttl", cookie),
        )),
        (None, Some(_)) => Err(FieldError::new(
            ErrorKind::AffinityConfig,
            "affinity_ttl requires affinity_cookie",
        )),
        (Some(cookie), Some(ttl)) => {
            if !COOKIE_NAME_REGEX.is_match(cookie) {
                return Err(FieldError::format(format!(
                    "affinity_cookie '{}' is not a valid cookie name",
                    cookie
                )));
            }
            let secs = parse_duration_secs(ttl)
                .map_err(|e| FieldError::new(ErrorKind::AffinityConfig, e.message))?;
            if secs > MAX_AFFINITY_TTL_SECS {
                return Err(FieldError::new(
                    ErrorKind::AffinityConfig,
                    format!("affinity_ttl cannot exceed {} seconds", MAX_AFFINITY_TTL_SECS),
                ));
            }
            Ok((Some(cookie.to_string()), Some(AffinityTtl::from_secs(secs))))
        }
    }
}
