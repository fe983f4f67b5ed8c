//! Route composer: rules, percentage resolution and route label checks.

use std::collections::HashSet;

use crate::domain::{CommittedId, Percentage, ResourceGraph, Route, RouteId, Rule, RuleTarget};

use super::context::ValidationContext;
use super::error::{ErrorKind, FieldError, IssueCollector, ValidationReport};
use super::match_condition::resolve_match_condition;
use super::primitives::{validate_label, validate_percentage};
use super::requests::{RulePayload, RoutePayload};
use super::service_target::assemble_service_target;

/// Split 100 evenly over `count` targets.
///
/// Each target gets `100 / count`; the remainder goes one point at a time to
/// the first targets in declaration order, so three targets always resolve
/// to `[34, 33, 33]`.
pub fn equal_split(count: usize) -> Vec<Percentage> {
    if count == 0 {
        return Vec::new();
    }
    let base = 100 / count;
    let remainder = 100 % count;
    (0..count)
        .map(|index| {
            let share = base + usize::from(index < remainder);
            Percentage::new_unchecked(share as u8)
        })
        .collect()
}

/// Resolve the percentages of one rule's targets.
///
/// Either every target states a percentage and they sum to exactly 100, or
/// none does and [`equal_split`] applies. Anything in between is rejected.
pub fn resolve_percentages(declared: &[Option<Percentage>]) -> Result<Vec<Percentage>, FieldError> {
    let explicit = declared.iter().filter(|p| p.is_some()).count();

    if explicit == 0 {
        return Ok(equal_split(declared.len()));
    }
    if explicit < declared.len() {
        return Err(FieldError::new(
            ErrorKind::PercentageSum,
            format!(
                "{} of {} service targets set a percentage; set it on all of them or on none",
                explicit,
                declared.len()
            ),
        ));
    }

    let resolved: Vec<Percentage> = declared.iter().flatten().copied().collect();
    let total: u32 = resolved.iter().map(|p| u32::from(p.get())).sum();
    if total != 100 {
        return Err(FieldError::new(
            ErrorKind::PercentageSum,
            format!("service target percentages sum to {}, expected 100", total),
        ));
    }
    Ok(resolved)
}

/// Validate one route and record it (and its targets) in the context
pub fn compose_route(
    issues: &mut IssueCollector,
    cx: &mut ValidationContext<'_>,
    payload: &RoutePayload,
) -> Option<Route> {
    let before = issues.issue_count();

    let label = issues.check("label", validate_label(&payload.label));

    let mut rules = Vec::with_capacity(payload.rules.len());
    if payload.rules.is_empty() {
        issues.push(ErrorKind::Required, Some("rules"), "a route needs at least one rule");
    }
    issues.in_field("rules", |c| {
        for (index, rule) in payload.rules.iter().enumerate() {
            if let Some(rule) = c.in_index(index, |c| compose_rule(c, cx, rule)) {
                rules.push(rule);
            }
        }
    });

    if issues.issue_count() > before {
        return None;
    }

    let route = Route { id: cx.next_id::<RouteId>(), label: label?, rules };
    cx.record_route(route.clone());
    Some(route)
}

fn compose_rule(
    issues: &mut IssueCollector,
    cx: &mut ValidationContext<'_>,
    payload: &RulePayload,
) -> Option<Rule> {
    let before = issues.issue_count();

    let match_condition =
        issues.in_field("match_condition", |c| resolve_match_condition(c, &payload.match_condition));

    if payload.service_targets.is_empty() {
        issues.push(ErrorKind::Required, Some("service_targets"), "a rule needs at least one service target");
        return None;
    }

    let mut targets = Vec::with_capacity(payload.service_targets.len());
    let mut declared = Vec::with_capacity(payload.service_targets.len());
    let mut percentages_valid = true;

    issues.in_field("service_targets", |c| {
        for (index, target) in payload.service_targets.iter().enumerate() {
            c.in_index(index, |c| {
                targets.push(assemble_service_target(c, cx, target));
                match target.percentage {
                    Some(raw) => match c.check("percentage", validate_percentage(raw)) {
                        Some(p) => declared.push(Some(p)),
                        None => percentages_valid = false,
                    },
                    None => declared.push(None),
                }
            });
        }
    });

    let percentages = if percentages_valid {
        issues.check("service_targets", resolve_percentages(&declared))
    } else {
        None
    };

    if issues.issue_count() > before {
        return None;
    }

    let service_targets = targets
        .into_iter()
        .zip(percentages?)
        .map(|(target, percentage)| {
            target.map(|t| RuleTarget { id: t.id, label: t.label, percentage })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Rule { match_condition: match_condition?, service_targets })
}

/// Report every route label that repeats an earlier one.
///
/// `labels` holds `(index, label)` pairs in declaration order; the issue is
/// placed at `<index>.<leaf>` under the current path when `leaf` is set.
pub fn check_unique_route_labels<'l>(
    issues: &mut IssueCollector,
    labels: impl IntoIterator<Item = (usize, &'l str)>,
    leaf: Option<&str>,
) {
    let mut seen = HashSet::new();
    for (index, label) in labels {
        if !seen.insert(label) {
            issues.in_index(index, |c| {
                c.push(
                    ErrorKind::DuplicateRouteLabel,
                    leaf,
                    format!("route label '{}' is already used in this configuration", label),
                )
            });
        }
    }
}

/// Validate a standalone route into a commit graph
pub fn validate_standalone_route(
    mut cx: ValidationContext<'_>,
    payload: &RoutePayload,
) -> Result<ResourceGraph, ValidationReport> {
    let mut issues = IssueCollector::new();
    match compose_route(&mut issues, &mut cx, payload) {
        Some(route) if issues.is_clean() => Ok(cx.into_graph(CommittedId::Route(route.id), None, None)),
        _ => Err(issues.into_report()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdSequence;
    use crate::validation::context::Snapshot;
    use crate::validation::requests::{HealthCheckPayload, MatchConditionPayload, ServiceTargetPayload};

    fn pct(values: &[u8]) -> Vec<Percentage> {
        values.iter().map(|v| Percentage::new_unchecked(*v)).collect()
    }

    fn target(label: &str, percentage: Option<i64>) -> ServiceTargetPayload {
        ServiceTargetPayload {
            id: None,
            label: label.into(),
            endpoints: vec![crate::validation::requests::EndpointPayload {
                ip: Some("10.1.0.1".into()),
                host: None,
                port: 80,
                rate_capacity: 10,
            }],
            ca_certificate: String::new(),
            load_balancing_policy: "least_request".into(),
            healthcheck: HealthCheckPayload {
                interval: 10,
                timeout: 2,
                unhealthy_threshold: 2,
                healthy_threshold: 2,
                path: String::new(),
                host: String::new(),
            },
            percentage,
        }
    }

    fn rule(targets: Vec<ServiceTargetPayload>) -> RulePayload {
        RulePayload {
            match_condition: MatchConditionPayload {
                hostname: "example.com".into(),
                match_field: "path_prefix".into(),
                match_value: "/".into(),
                affinity_cookie: None,
                affinity_ttl: None,
            },
            service_targets: targets,
        }
    }

    fn compose(payload: &RoutePayload) -> (Option<Route>, ValidationReport) {
        let snapshot = Snapshot::new();
        let ids = IdSequence::default();
        let mut cx = ValidationContext::new(&snapshot, &ids, "example.net");
        let mut issues = IssueCollector::new();
        let route = compose_route(&mut issues, &mut cx, payload);
        (route, issues.into_report())
    }

    #[test]
    fn equal_split_gives_remainder_to_first_targets() {
        assert_eq!(equal_split(3), pct(&[34, 33, 33]));
        assert_eq!(equal_split(1), pct(&[100]));
        assert_eq!(equal_split(6), pct(&[17, 17, 17, 17, 16, 16]));
        assert_eq!(equal_split(7), pct(&[15, 15, 14, 14, 14, 14, 14]));
        assert!(equal_split(0).is_empty());
    }

    #[test]
    fn explicit_percentages_must_sum_to_100() {
        let ok = resolve_percentages(&[Some(Percentage::new_unchecked(60)), Some(Percentage::new_unchecked(40))]);
        assert_eq!(ok.unwrap(), pct(&[60, 40]));

        let err = resolve_percentages(&[Some(Percentage::new_unchecked(60)), Some(Percentage::new_unchecked(30))])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PercentageSum);
    }

    #[test]
    fn partial_percentages_are_rejected() {
        let err = resolve_percentages(&[Some(Percentage::new_unchecked(100)), None]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PercentageSum);
    }

    #[test]
    fn composes_route_with_even_split() {
        let payload = RoutePayload {
            label: "web".into(),
            rules: vec![rule(vec![target("a", None), target("b", None), target("c", None)])],
        };
        let (route, report) = compose(&payload);
        assert!(report.is_empty(), "{}", report);
        let route = route.unwrap();
        let shares: Vec<u8> = route.rules[0].service_targets.iter().map(|t| t.percentage.get()).collect();
        assert_eq!(shares, vec![34, 33, 33]);
        assert_eq!(route.rules[0].percentage_total(), 100);
    }

    #[test]
    fn percentage_sum_error_is_reported_on_the_rule() {
        let payload = RoutePayload {
            label: "web".into(),
            rules: vec![rule(vec![target("a", Some(50)), target("b", Some(20))])],
        };
        let (route, report) = compose(&payload);
        assert!(route.is_none());
        assert_eq!(report.kinds(), vec![ErrorKind::PercentageSum]);
        assert_eq!(report.issues[0].field, "rules[0].service_targets");
    }

    #[test]
    fn out_of_range_percentage_reports_range_only() {
        let payload = RoutePayload {
            label: "web".into(),
            rules: vec![rule(vec![target("a", Some(150)), target("b", Some(-50))])],
        };
        let (_, report) = compose(&payload);
        assert_eq!(report.kinds(), vec![ErrorKind::Range]);
        assert_eq!(report.issues[0].field, "rules[0].service_targets[0].percentage");
    }

    #[test]
    fn empty_rules_and_targets_are_required() {
        let (_, report) = compose(&RoutePayload { label: "web".into(), rules: vec![] });
        assert_eq!(report.kinds(), vec![ErrorKind::Required]);

        let (_, report) = compose(&RoutePayload { label: "web".into(), rules: vec![rule(vec![])] });
        assert_eq!(report.issues[0].field, "rules[0].service_targets");
    }

    #[test]
    fn duplicate_route_labels_are_reported_at_the_repeat() {
        let mut issues = IssueCollector::new();
        issues.in_field("routes", |c| {
            check_unique_route_labels(c, [(0, "a"), (1, "b"), (2, "a")], Some("label"))
        });
        let report = issues.into_report();
        assert_eq!(report.kinds(), vec![ErrorKind::DuplicateRouteLabel]);
        assert_eq!(report.issues[0].field, "routes[2].label");
    }
}
