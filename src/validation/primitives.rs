//! Scalar field validators.
//!
//! Every function here is pure: it takes the raw wire value and returns the
//! canonical typed value or a [`FieldError`] carrying its taxonomy kind.

use std::net::IpAddr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::domain::{
    CertificateType, EndpointAddress, LoadBalancingPolicy, MatchField, Percentage, Port, Protocol,
};

use super::error::{ErrorKind, FieldError};

/// Maximum label length for every labelled entity
pub const MAX_LABEL_LEN: usize = 64;

/// Longest accepted affinity TTL (30 days)
pub const MAX_AFFINITY_TTL_SECS: u64 = 30 * 24 * 3600;

/// Upper bound for health check interval and timeout, in seconds
pub const MAX_HEALTH_CHECK_SECS: i64 = 3600;

lazy_static! {
    /// Labels: alphanumeric, underscore, period, hyphen only
    static ref LABEL_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_.-]+$").unwrap();

    /// Regions: lowercase slug such as `us-east` or `ap-south-1`
    static ref REGION_REGEX: Regex = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();

    /// Duration with an optional unit suffix
    static ref DURATION_REGEX: Regex = Regex::new(r"^(\d+)\s*(ms|s|m|h|d)?$").unwrap();

    /// HTTP method validation: standard HTTP verbs only
    static ref HTTP_METHOD_REGEX: Regex =
        Regex::new(r"^(GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS|TRACE|CONNECT)$").unwrap();
}

pub fn validate_port(port: i64) -> Result<Port, FieldError> {
    if !(1..=65535).contains(&port) {
        return Err(FieldError::range(format!("port {} must be between 1 and 65535", port)));
    }
    Ok(Port::new_unchecked(port as u16))
}

pub fn validate_protocol(protocol: &str) -> Result<Protocol, FieldError> {
    Protocol::ALL.into_iter().find(|p| p.as_str() == protocol).ok_or_else(|| {
        FieldError::unknown_enum(format!(
            "unknown protocol '{}', expected one of TCP, HTTP, HTTPS",
            protocol
        ))
    })
}

/// Percentages are whole numbers in `0..=100`
pub fn validate_percentage(percentage: i64) -> Result<Percentage, FieldError> {
    if !(0..=100).contains(&percentage) {
        return Err(FieldError::range(format!(
            "percentage {} must be between 0 and 100",
            percentage
        )));
    }
    Ok(Percentage::new_unchecked(percentage as u8))
}

/// Exactly one of `ip` and `host` must be set. Blank strings count as unset.
pub fn validate_endpoint_address(
    ip: Option<&str>,
    host: Option<&str>,
) -> Result<EndpointAddress, FieldError> {
    let ip = ip.map(str::trim).filter(|s| !s.is_empty());
    let host = host.map(str::trim).filter(|s| !s.is_empty());

    match (ip, host) {
        (Some(_), Some(_)) => {
            Err(FieldError::exclusivity("endpoint must set exactly one of 'ip' or 'host', not both"))
        }
        (None, None) => {
            Err(FieldError::exclusivity("endpoint must set exactly one of 'ip' or 'host'"))
        }
        (Some(ip), None) => ip
            .parse::<IpAddr>()
            .map(EndpointAddress::Ip)
            .map_err(|_| FieldError::format(format!("'{}' is not a valid IP address", ip))),
        (None, Some(host)) => validate_hostname(host, false).map(EndpointAddress::Host),
    }
}

pub fn validate_policy(policy: &str) -> Result<LoadBalancingPolicy, FieldError> {
    LoadBalancingPolicy::ALL.into_iter().find(|p| p.as_str() == policy).ok_or_else(|| {
        FieldError::unknown_enum(format!(
            "unknown load balancing policy '{}', expected one of round_robin, least_request, ring_hash, random, maglev",
            policy
        ))
    })
}

pub fn validate_match_field(field: &str) -> Result<MatchField, FieldError> {
    MatchField::ALL.into_iter().find(|f| f.as_str() == field).ok_or_else(|| {
        FieldError::unknown_enum(format!(
            "unknown match field '{}', expected one of path_prefix, query, host, header, method",
            field
        ))
    })
}

pub fn validate_certificate_type(certificate_type: &str) -> Result<CertificateType, FieldError> {
    CertificateType::ALL.into_iter().find(|t| t.as_str() == certificate_type).ok_or_else(|| {
        FieldError::unknown_enum(format!(
            "unknown certificate type '{}', expected ca or downstream",
            certificate_type
        ))
    })
}

pub fn validate_label(label: &str) -> Result<String, FieldError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(FieldError::required("label cannot be empty"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(FieldError::format(format!(
            "label exceeds maximum length of {} characters",
            MAX_LABEL_LEN
        )));
    }
    if !LABEL_REGEX.is_match(label) {
        return Err(FieldError::format(format!(
            "label '{}' may only contain letters, digits, '_', '.' and '-'",
            label
        )));
    }
    Ok(label.to_string())
}

/// Validate a DNS hostname, returning it lower-cased.
///
/// A single leading `*.` wildcard label is accepted when `allow_wildcard` is set.
pub fn validate_hostname(hostname: &str, allow_wildcard: bool) -> Result<String, FieldError> {
    let hostname = hostname.trim().to_ascii_lowercase();
    if hostname.is_empty() {
        return Err(FieldError::required("hostname cannot be empty"));
    }
    if hostname.len() > 253 {
        return Err(FieldError::format("hostname exceeds maximum length of 253 characters"));
    }

    let to_check = match hostname.strip_prefix("*.") {
        Some(rest) if allow_wildcard => rest,
        Some(_) => {
            return Err(FieldError::format(format!(
                "wildcard hostname '{}' is not allowed here",
                hostname
            )))
        }
        None => hostname.as_str(),
    };

    if !is_valid_domain_format(to_check) {
        return Err(FieldError::format(format!("'{}' is not a valid hostname", hostname)));
    }
    Ok(hostname)
}

pub fn validate_region(region: &str) -> Result<String, FieldError> {
    let region = region.trim().to_ascii_lowercase();
    if region.is_empty() {
        return Err(FieldError::required("region cannot be empty"));
    }
    if !REGION_REGEX.is_match(&region) {
        return Err(FieldError::format(format!("'{}' is not a valid region slug", region)));
    }
    Ok(region)
}

/// Parse `"<n>"` (seconds) or `"<n><unit>"` with unit ms, s, m, h or d into
/// whole seconds. Millisecond values round up to the next second.
pub fn parse_duration_secs(raw: &str) -> Result<u64, FieldError> {
    let trimmed = raw.trim();
    let caps = DURATION_REGEX.captures(trimmed).ok_or_else(|| {
        FieldError::format(format!(
            "'{}' is not a non-negative duration (expected e.g. 30s, 5m, 1h)",
            raw
        ))
    })?;

    let value: u64 = caps[1]
        .parse()
        .map_err(|_| FieldError::range(format!("duration '{}' is too large", raw)))?;
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("s");

    let secs = match unit {
        "ms" => Some(value.div_ceil(1000)),
        "s" => Some(value),
        "m" => value.checked_mul(60),
        "h" => value.checked_mul(3600),
        "d" => value.checked_mul(86_400),
        _ => None,
    };
    secs.ok_or_else(|| FieldError::range(format!("duration '{}' is too large", raw)))
}

pub fn validate_http_method(method: &str) -> Result<String, FieldError> {
    let method = method.trim().to_ascii_uppercase();
    if !HTTP_METHOD_REGEX.is_match(&method) {
        return Err(FieldError::format(format!("'{}' is not a standard HTTP method", method)));
    }
    Ok(method)
}

pub fn validate_path_prefix(path: &str) -> Result<String, FieldError> {
    if !path.starts_with('/') {
        return Err(FieldError::format(format!("path prefix '{}' must start with '/'", path)));
    }
    if path.contains("..") {
        return Err(FieldError::format("path prefix cannot contain '..'"));
    }
    if path.chars().any(char::is_whitespace) {
        return Err(FieldError::format("path prefix cannot contain whitespace"));
    }
    Ok(path.to_string())
}

pub fn validate_rate_capacity(capacity: i64) -> Result<u64, FieldError> {
    u64::try_from(capacity).map_err(|_| {
        FieldError::range(format!("rate_capacity {} must be zero or greater", capacity))
    })
}

pub fn validate_threshold(threshold: i64) -> Result<u32, FieldError> {
    if threshold < 1 {
        return Err(FieldError::new(
            ErrorKind::HealthCheckThreshold,
            format!("threshold {} must be at least 1", threshold),
        ));
    }
    u32::try_from(threshold)
        .map_err(|_| FieldError::range(format!("threshold {} is too large", threshold)))
}

pub fn validate_health_check_seconds(seconds: i64) -> Result<u64, FieldError> {
    if !(1..=MAX_HEALTH_CHECK_SECS).contains(&seconds) {
        return Err(FieldError::range(format!(
            "{} seconds must be between 1 and {}",
            seconds, MAX_HEALTH_CHECK_SECS
        )));
    }
    Ok(seconds as u64)
}

/// Check if a domain follows basic formatting rules (without wildcard).
pub(crate) fn is_valid_domain_format(domain: &str) -> bool {
    if domain.is_empty() || domain.starts_with('.') || domain.ends_with('.') || domain.contains("..")
    {
        return false;
    }

    domain.split('.').all(|label| {
        let bytes = label.as_bytes();
        !label.is_empty()
            && label.len() <= 63
            && bytes[0].is_ascii_alphanumeric()
            && bytes[bytes.len() - 1].is_ascii_alphanumeric()
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
