//! Validation error taxonomy and the per-request issue collector.
//!
//! Validation never stops at the first problem. Every check pushes into an
//! [`IssueCollector`] that tracks the field path being visited, and the
//! request is answered with the full [`ValidationReport`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of validation failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Numeric field out of bounds
    Range,
    /// Value outside a closed enumeration (protocol, policy, match field, certificate type)
    UnknownEnum,
    /// Endpoint has both or neither of `ip` and `host`
    Exclusivity,
    /// Only one of `affinity_cookie` / `affinity_ttl` present, or TTL unparsable
    AffinityConfig,
    /// Same (address, port) twice within one service target
    DuplicateEndpoint,
    /// Health check timeout not strictly below interval
    HealthCheckTiming,
    /// Health check threshold below 1
    HealthCheckThreshold,
    /// Rule percentages do not add up to 100
    PercentageSum,
    /// Route label repeated within a configuration
    DuplicateRouteLabel,
    /// SNI hostname repeated within a certificate table
    #[serde(rename = "duplicate_sni")]
    DuplicateSni,
    /// Certificate present where none (or a different type) is allowed
    UnexpectedCertificate,
    /// Both `routes` and `route_ids` supplied
    AmbiguousRouteSource,
    /// Configuration label repeated within a loadbalancer
    DuplicateConfigurationLabel,
    /// Referenced id does not exist
    ReferenceNotFound,
    /// Commit-time race
    Conflict,
    /// Mandatory field or collection missing or empty
    Required,
    /// Malformed label, hostname, address, path or method
    Format,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Range => "range",
            ErrorKind::UnknownEnum => "unknown_enum",
            ErrorKind::Exclusivity => "exclusivity",
            ErrorKind::AffinityConfig => "affinity_config",
            ErrorKind::DuplicateEndpoint => "duplicate_endpoint",
            ErrorKind::HealthCheckTiming => "health_check_timing",
            ErrorKind::HealthCheckThreshold => "health_check_threshold",
            ErrorKind::PercentageSum => "percentage_sum",
            ErrorKind::DuplicateRouteLabel => "duplicate_route_label",
            ErrorKind::DuplicateSni => "duplicate_sni",
            ErrorKind::UnexpectedCertificate => "unexpected_certificate",
            ErrorKind::AmbiguousRouteSource => "ambiguous_route_source",
            ErrorKind::DuplicateConfigurationLabel => "duplicate_configuration_label",
            ErrorKind::ReferenceNotFound => "reference_not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Required => "required",
            ErrorKind::Format => "format",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a single primitive check, before a field path is attached
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FieldError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn range<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Range, message)
    }

    pub fn unknown_enum<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::UnknownEnum, message)
    }

    pub fn exclusivity<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Exclusivity, message)
    }

    pub fn required<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Required, message)
    }

    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Format, message)
    }
}

/// One validation failure located at a field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: ErrorKind,
    /// Dotted path with indices, e.g. `configurations[0].routes[1].label`
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new<F: Into<String>, M: Into<String>>(kind: ErrorKind, field: F, message: M) -> Self {
        Self { kind, field: field.into(), message: message.into() }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "[{}] {}", self.kind, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.kind, self.field, self.message)
        }
    }
}

/// All issues found while validating one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether any issue of the given kind was reported
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }

    /// Issues of the given kind, in report order
    pub fn of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    /// Distinct kinds in first-seen order
    pub fn kinds(&self) -> Vec<ErrorKind> {
        let mut kinds = Vec::new();
        for issue in &self.issues {
            if !kinds.contains(&issue.kind) {
                kinds.push(issue.kind);
            }
        }
        kinds
    }
}

impl From<Vec<ValidationIssue>> for ValidationReport {
    fn from(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        write!(f, "{} issue(s): {}", self.issues.len(), rendered.join("; "))
    }
}

#[derive(Debug, Clone)]
enum PathSegment {
    Field(String),
    Index(usize),
}

/// Accumulates issues while walking a payload tree.
#[derive(Debug, Default)]
pub struct IssueCollector {
    path: Vec<PathSegment>,
    issues: Vec<ValidationIssue>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with `name` appended to the current path
    pub fn in_field<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(PathSegment::Field(name.to_string()));
        let result = f(self);
        self.path.pop();
        result
    }

    /// Run `f` with `[index]` appended to the current path
    pub fn in_index<R>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(PathSegment::Index(index));
        let result = f(self);
        self.path.pop();
        result
    }

    /// Record an issue at the current path, optionally extended by `leaf`
    pub fn push<M: Into<String>>(&mut self, kind: ErrorKind, leaf: Option<&str>, message: M) {
        let field = self.render_path(leaf);
        self.issues.push(ValidationIssue { kind, field, message: message.into() });
    }

    /// Record `err` at `leaf` if present; pass the value through otherwise
    pub fn check<T>(&mut self, leaf: &str, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err.kind, Some(leaf), err.message);
                None
            }
        }
    }

    /// Record `err` at the current path
    pub fn check_here<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err.kind, None, err.message);
                None
            }
        }
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_report(self) -> ValidationReport {
        ValidationReport { issues: self.issues }
    }

    fn render_path(&self, leaf: Option<&str>) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        if let Some(leaf) = leaf {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(leaf);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_renders_nested_paths() {
        let mut collector = IssueCollector::new();
        collector.in_field("configurations", |c| {
            c.in_index(0, |c| {
                c.in_field("routes", |c| {
                    c.in_index(2, |c| c.push(ErrorKind::Required, Some("label"), "empty"))
                })
            })
        });
        collector.push(ErrorKind::Required, Some("regions"), "empty");

        let report = collector.into_report();
        assert_eq!(report.issues[0].field, "configurations[0].routes[2].label");
        assert_eq!(report.issues[1].field, "regions");
    }

    #[test]
    fn check_passes_values_and_records_errors() {
        let mut collector = IssueCollector::new();
        assert_eq!(collector.check("port", Ok::<_, FieldError>(80)), Some(80));
        assert_eq!(collector.check::<u16>("port", Err(FieldError::range("too big"))), None);
        assert_eq!(collector.issue_count(), 1);
    }

    #[test]
    fn report_kinds_are_deduplicated_in_order() {
        let report = ValidationReport::from(vec![
            ValidationIssue::new(ErrorKind::Range, "a", "x"),
            ValidationIssue::new(ErrorKind::Format, "b", "y"),
            ValidationIssue::new(ErrorKind::Range, "c", "z"),
        ]);
        assert_eq!(report.kinds(), vec![ErrorKind::Range, ErrorKind::Format]);
        assert!(report.contains(ErrorKind::Format));
        assert_eq!(report.of_kind(ErrorKind::Range).count(), 2);
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ErrorKind::DuplicateSni).unwrap(), "\"duplicate_sni\"");
        assert_eq!(
            serde_json::to_string(&ErrorKind::AmbiguousRouteSource).unwrap(),
            "\"ambiguous_route_source\""
        );
    }
}
