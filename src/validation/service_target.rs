//! Service target assembler.

use std::collections::HashSet;

use crate::domain::{
    CertificateId, CertificateType, Endpoint, EndpointAddress, HealthCheck, ServiceTarget,
    ServiceTargetId,
};

use super::context::ValidationContext;
use super::error::{ErrorKind, FieldError, IssueCollector};
use super::primitives::{
    validate_endpoint_address, validate_health_check_seconds, validate_hostname, validate_label,
    validate_path_prefix, validate_policy, validate_port, validate_rate_capacity,
    validate_threshold,
};
use super::requests::{EndpointPayload, HealthCheckPayload, ServiceTargetPayload};

/// Validate a service target payload and record it in the context.
///
/// A payload with an `id` reuses that committed target. Committed targets
/// are immutable, so the payload must restate it exactly; any difference is
/// a conflict. Without an `id` a synthetic id is assigned.
pub fn assemble_service_target(
    issues: &mut IssueCollector,
    cx: &mut ValidationContext<'_>,
    payload: &ServiceTargetPayload,
) -> Option<ServiceTarget> {
    let before = issues.issue_count();

    let id = match payload.id {
        Some(raw) => {
            let id = ServiceTargetId::new(raw);
            if cx.snapshot().service_targets.contains_key(&id) {
                cx.references_mut().add_service_target(id);
            } else {
                issues.push(
                    ErrorKind::ReferenceNotFound,
                    Some("id"),
                    format!("service target {} does not exist", id),
                );
            }
            id
        }
        None => cx.next_id(),
    };

    let label = issues.check("label", validate_label(&payload.label));
    let endpoints = issues.in_field("endpoints", |c| assemble_endpoints(c, &payload.endpoints));
    let ca_certificate = issues.check("ca_certificate", resolve_ca_certificate(cx, &payload.ca_certificate));
    let load_balancing_policy =
        issues.check("load_balancing_policy", validate_policy(&payload.load_balancing_policy));
    let healthcheck = issues.in_field("healthcheck", |c| validate_health_check(c, &payload.healthcheck));

    if issues.issue_count() > before {
        return None;
    }

    let ca_certificate = ca_certificate?;
    if let Some(certificate) = ca_certificate {
        cx.references_mut().add_certificate(certificate);
    }

    let target = ServiceTarget {
        id,
        label: label?,
        endpoints: endpoints?,
        ca_certificate,
        load_balancing_policy: load_balancing_policy?,
        healthcheck: healthcheck?,
    };
    if let Some(committed) = payload.id.and_then(|_| cx.snapshot().service_targets.get(&target.id)) {
        if *committed != target {
            issues.push(
                ErrorKind::Conflict,
                Some("id"),
                format!(
                    "service target {} is committed and cannot be changed; omit the id to create a new target",
                    target.id
                ),
            );
            return None;
        }
    }
    cx.record_service_target(issues, target.clone());
    Some(target)
}

/// Build the endpoint set, rejecting duplicate (address, port) pairs
pub fn assemble_endpoints(
    issues: &mut IssueCollector,
    payloads: &[EndpointPayload],
) -> Option<Vec<Endpoint>> {
    if payloads.is_empty() {
        issues.push(ErrorKind::Required, None, "at least one endpoint is required");
        return None;
    }

    let before = issues.issue_count();
    let mut seen: HashSet<(EndpointAddress, u16)> = HashSet::new();
    let mut endpoints = Vec::with_capacity(payloads.len());

    for (index, payload) in payloads.iter().enumerate() {
        issues.in_index(index, |c| {
            let address = c.check_here(validate_endpoint_address(
                payload.ip.as_deref(),
                payload.host.as_deref(),
            ));
            let port = c.check("port", validate_port(payload.port));
            let rate_capacity = c.check("rate_capacity", validate_rate_capacity(payload.rate_capacity));

            if let (Some(address), Some(port), Some(rate_capacity)) = (address, port, rate_capacity) {
                if !seen.insert((address.clone(), port.get())) {
                    c.push(
                        ErrorKind::DuplicateEndpoint,
                        None,
                        format!("endpoint {}:{} is listed more than once", address, port),
                    );
                    return;
                }
                endpoints.push(Endpoint { address, port, rate_capacity });
            }
        });
    }

    (issues.issue_count() == before).then_some(endpoints)
}

/// Validate health check scalars and the cross-field timing rule
pub fn validate_health_check(
    issues: &mut IssueCollector,
    payload: &HealthCheckPayload,
) -> Option<HealthCheck> {
    let before = issues.issue_count();

    let interval = issues.check("interval", validate_health_check_seconds(payload.interval));
    let timeout = issues.check("timeout", validate_health_check_seconds(payload.timeout));
    let unhealthy_threshold =
        issues.check("unhealthy_threshold", validate_threshold(payload.unhealthy_threshold));
    let healthy_threshold = issues.check("healthy_threshold", validate_threshold(payload.healthy_threshold));

    if let (Some(interval), Some(timeout)) = (interval, timeout) {
        if timeout >= interval {
            issues.push(
                ErrorKind::HealthCheckTiming,
                Some("timeout"),
                format!("timeout ({}s) must be less than interval ({}s)", timeout, interval),
            );
        }
    }

    let path = if payload.path.is_empty() {
        Some(String::new())
    } else {
        issues.check("path", validate_path_prefix(&payload.path))
    };
    let host = if payload.host.trim().is_empty() {
        Some(String::new())
    } else {
        issues.check("host", validate_hostname(&payload.host, false))
    };

    if issues.issue_count() > before {
        return None;
    }

    Some(HealthCheck {
        interval: interval?,
        timeout: timeout?,
        unhealthy_threshold: unhealthy_threshold?,
        healthy_threshold: healthy_threshold?,
        path: path?,
        host: host?,
    })
}

/// An empty reference means upstream TLS is not verified. Anything else must
/// name an existing `ca` certificate.
fn resolve_ca_certificate(
    cx: &ValidationContext<'_>,
    raw: &str,
) -> Result<Option<CertificateId>, FieldError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let id: CertificateId = raw
        .parse()
        .map_err(|_| FieldError::format(format!("'{}' is not a certificate id", raw)))?;

    match cx.snapshot().certificates.get(&id) {
        None => Err(FieldError::new(
            ErrorKind::ReferenceNotFound,
            format!("certificate {} does not exist", id),
        )),
        Some(certificate) if certificate.certificate_type != CertificateType::Ca => {
            Err(FieldError::new(
                ErrorKind::UnexpectedCertificate,
                format!(
                    "certificate {} is a {} certificate; ca_certificate requires a ca certificate",
                    id, certificate.certificate_type
                ),
            ))
        }
        Some(_) => Ok(Some(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Certificate, IdSequence, LoadBalancingPolicy};
    use crate::validation::context::Snapshot;
    use crate::validation::ValidationReport;

    fn health_check() -> HealthCheckPayload {
        HealthCheckPayload {
            interval: 10,
            timeout: 5,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
            path: "/healthz".into(),
            host: "backend.example.com".into(),
        }
    }

    fn endpoint(ip: &str, port: i64) -> EndpointPayload {
        EndpointPayload { ip: Some(ip.into()), host: None, port, rate_capacity: 100 }
    }

    fn target() -> ServiceTargetPayload {
        ServiceTargetPayload {
            id: None,
            label: "web-pool".into(),
            endpoints: vec![endpoint("10.0.0.1", 8080), endpoint("10.0.0.2", 8080)],
            ca_certificate: String::new(),
            load_balancing_policy: "round_robin".into(),
            healthcheck: health_check(),
            percentage: None,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new()
            .with_certificate(Certificate {
                id: CertificateId::new(1),
                label: "root-ca".into(),
                certificate_type: CertificateType::Ca,
            })
            .with_certificate(Certificate {
                id: CertificateId::new(2),
                label: "site".into(),
                certificate_type: CertificateType::Downstream,
            })
    }

    fn assemble(
        snapshot: &Snapshot,
        payload: &ServiceTargetPayload,
    ) -> (Option<ServiceTarget>, ValidationReport) {
        let ids = IdSequence::starting_at(100);
        let mut cx = ValidationContext::new(snapshot, &ids, "example.net");
        let mut issues = IssueCollector::new();
        let target = assemble_service_target(&mut issues, &mut cx, payload);
        (target, issues.into_report())
    }

    #[test]
    fn assembles_new_target_with_synthetic_id() {
        let (target, report) = assemble(&snapshot(), &target());
        assert!(report.is_empty(), "{}", report);
        let target = target.unwrap();
        assert_eq!(target.id, ServiceTargetId::new(100));
        assert_eq!(target.endpoints.len(), 2);
        assert_eq!(target.load_balancing_policy, LoadBalancingPolicy::RoundRobin);
        assert_eq!(target.ca_certificate, None);
    }

    #[test]
    fn duplicate_endpoints_are_rejected() {
        let mut payload = target();
        payload.endpoints.push(endpoint("10.0.0.1", 8080));
        let (target, report) = assemble(&snapshot(), &payload);
        assert!(target.is_none());
        assert_eq!(report.kinds(), vec![ErrorKind::DuplicateEndpoint]);
        assert_eq!(report.issues[0].field, "endpoints[2]");
    }

    #[test]
    fn same_address_on_another_port_is_fine() {
        let mut payload = target();
        payload.endpoints.push(endpoint("10.0.0.1", 9090));
        let (_, report) = assemble(&snapshot(), &payload);
        assert!(report.is_empty());
    }

    #[test]
    fn duplicate_host_endpoints_compare_case_insensitively() {
        let mut payload = target();
        payload.endpoints = vec![
            EndpointPayload { ip: None, host: Some("API.example.com".into()), port: 80, rate_capacity: 0 },
            EndpointPayload { ip: None, host: Some("api.example.com".into()), port: 80, rate_capacity: 0 },
        ];
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(report.kinds(), vec![ErrorKind::DuplicateEndpoint]);
    }

    #[test]
    fn empty_endpoints_are_required() {
        let mut payload = target();
        payload.endpoints.clear();
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(report.kinds(), vec![ErrorKind::Required]);
        assert_eq!(report.issues[0].field, "endpoints");
    }

    #[test]
    fn timeout_must_be_below_interval() {
        let mut payload = target();
        payload.healthcheck.timeout = 10;
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(report.kinds(), vec![ErrorKind::HealthCheckTiming]);
        assert_eq!(report.issues[0].field, "healthcheck.timeout");
    }

    #[test]
    fn thresholds_must_be_positive() {
        let mut payload = target();
        payload.healthcheck.healthy_threshold = 0;
        payload.healthcheck.unhealthy_threshold = -2;
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(report.of_kind(ErrorKind::HealthCheckThreshold).count(), 2);
    }

    #[test]
    fn ca_certificate_must_exist_and_be_a_ca() {
        let mut payload = target();
        payload.ca_certificate = "1".into();
        let (target, report) = assemble(&snapshot(), &payload);
        assert!(report.is_empty());
        assert_eq!(target.unwrap().ca_certificate, Some(CertificateId::new(1)));

        payload.ca_certificate = "2".into();
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(report.kinds(), vec![ErrorKind::UnexpectedCertificate]);

        payload.ca_certificate = "99".into();
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(report.kinds(), vec![ErrorKind::ReferenceNotFound]);

        payload.ca_certificate = "root".into();
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(report.kinds(), vec![ErrorKind::Format]);
    }

    #[test]
    fn referenced_id_must_exist() {
        let mut payload = target();
        payload.id = Some(55);
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(report.kinds(), vec![ErrorKind::ReferenceNotFound]);
        assert_eq!(report.issues[0].field, "id");
    }

    #[test]
    fn unknown_policy_and_bad_endpoint_are_collected_together() {
        let mut payload = target();
        payload.load_balancing_policy = "weighted".into();
        payload.endpoints[0].host = Some("also.example.com".into());
        payload.endpoints[1].port = 0;
        let (_, report) = assemble(&snapshot(), &payload);
        assert_eq!(
            report.kinds(),
            vec![ErrorKind::Exclusivity, ErrorKind::Range, ErrorKind::UnknownEnum]
        );
    }
}
