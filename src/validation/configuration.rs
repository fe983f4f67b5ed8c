//! Configuration aggregator.
//!
//! Checks the listener itself (port, protocol, certificate table), resolves
//! where its routes come from, and enforces route label uniqueness across
//! inline and referenced routes alike.

use std::collections::HashSet;

use crate::domain::{
    CertificateBinding, CertificateId, CertificateType, CommittedId, Configuration,
    ConfigurationId, Protocol, ResourceGraph, RouteId, RouteRef,
};

use super::context::ValidationContext;
use super::error::{ErrorKind, FieldError, IssueCollector, ValidationReport};
use super::primitives::{validate_hostname, validate_label, validate_port, validate_protocol};
use super::requests::{CertificateTableEntry, ConfigurationPayload, RoutePayload};
use super::route::{check_unique_route_labels, compose_route};

/// Where a configuration's routes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource<'a> {
    /// Created together with the configuration
    Inline(&'a [RoutePayload]),
    /// Pre-existing routes
    ByReference(&'a [i64]),
    Empty,
}

impl<'a> RouteSource<'a> {
    /// `routes` and `route_ids` are mutually exclusive
    pub fn from_payload(payload: &'a ConfigurationPayload) -> Result<Self, FieldError> {
        match (&payload.routes, &payload.route_ids) {
            (Some(_), Some(_)) => Err(FieldError::new(
                ErrorKind::AmbiguousRouteSource,
                "supply either 'routes' or 'route_ids', not both",
            )),
            (Some(routes), None) => Ok(RouteSource::Inline(routes)),
            (None, Some(ids)) => Ok(RouteSource::ByReference(ids)),
            (None, None) => Ok(RouteSource::Empty),
        }
    }
}

/// Validate one configuration and record it (and its inline routes)
pub fn aggregate_configuration(
    issues: &mut IssueCollector,
    cx: &mut ValidationContext<'_>,
    payload: &ConfigurationPayload,
) -> Option<Configuration> {
    let before = issues.issue_count();

    let label = issues.check("label", validate_label(&payload.label));
    let port = issues.check("port", validate_port(payload.port));
    let protocol = issues.check("protocol", validate_protocol(&payload.protocol));

    let certificate_table = match protocol {
        Some(protocol) => issues.in_field("certificate_table", |c| {
            validate_certificate_table(c, cx, protocol, &payload.certificate_table)
        }),
        None => None,
    };

    let routes = match issues.check_here(RouteSource::from_payload(payload)) {
        Some(source) => resolve_routes(issues, cx, source),
        None => None,
    };

    if issues.issue_count() > before {
        return None;
    }

    let configuration = Configuration {
        id: cx.next_id::<ConfigurationId>(),
        label: label?,
        port: port?,
        protocol: protocol?,
        certificate_table: certificate_table?,
        routes: routes?,
    };
    cx.record_configuration(configuration.clone());
    Some(configuration)
}

/// HTTPS needs at least one binding with unique SNI hostnames, each pointing
/// at a downstream certificate. TCP and HTTP listeners carry no table.
pub fn validate_certificate_table(
    issues: &mut IssueCollector,
    cx: &mut ValidationContext<'_>,
    protocol: Protocol,
    entries: &[CertificateTableEntry],
) -> Option<Vec<CertificateBinding>> {
    if !protocol.terminates_tls() {
        if !entries.is_empty() {
            issues.push(
                ErrorKind::UnexpectedCertificate,
                None,
                format!("{} configurations cannot have a certificate_table", protocol),
            );
            return None;
        }
        return Some(Vec::new());
    }

    if entries.is_empty() {
        issues.push(
            ErrorKind::Required,
            None,
            "HTTPS configurations need at least one certificate_table entry",
        );
        return None;
    }

    let before = issues.issue_count();
    let mut seen_sni = HashSet::new();
    let mut bindings = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        issues.in_index(index, |c| {
            let sni_hostname = c.check("sni_hostname", validate_hostname(&entry.sni_hostname, true));
            if let Some(sni) = &sni_hostname {
                if !seen_sni.insert(sni.clone()) {
                    c.push(
                        ErrorKind::DuplicateSni,
                        Some("sni_hostname"),
                        format!("sni_hostname '{}' appears more than once", sni),
                    );
                }
            }

            let certificate_id =
                c.check("certificate_id", resolve_downstream_certificate(cx, &entry.certificate_id));

            if let (Some(sni_hostname), Some(certificate_id)) = (sni_hostname, certificate_id) {
                cx.references_mut().add_certificate(certificate_id);
                bindings.push(CertificateBinding { sni_hostname, certificate_id });
            }
        });
    }

    (issues.issue_count() == before).then_some(bindings)
}

fn resolve_downstream_certificate(
    cx: &ValidationContext<'_>,
    raw: &str,
) -> Result<CertificateId, FieldError> {
    if raw.trim().is_empty() {
        return Err(FieldError::required("certificate_id cannot be empty"));
    }
    let id: CertificateId = raw
        .parse()
        .map_err(|_| FieldError::format(format!("'{}' is not a certificate id", raw)))?;

    match cx.snapshot().certificates.get(&id) {
        None => Err(FieldError::new(
            ErrorKind::ReferenceNotFound,
            format!("certificate {} does not exist", id),
        )),
        Some(certificate) if certificate.certificate_type != CertificateType::Downstream => {
            Err(FieldError::new(
                ErrorKind::UnexpectedCertificate,
                format!(
                    "certificate {} is a {} certificate; certificate_table requires downstream certificates",
                    id, certificate.certificate_type
                ),
            ))
        }
        Some(_) => Ok(id),
    }
}

fn resolve_routes(
    issues: &mut IssueCollector,
    cx: &mut ValidationContext<'_>,
    source: RouteSource<'_>,
) -> Option<Vec<RouteRef>> {
    match source {
        RouteSource::Empty => Some(Vec::new()),
        RouteSource::Inline(payloads) => issues.in_field("routes", |c| {
            let before = c.issue_count();
            let mut refs = Vec::with_capacity(payloads.len());
            for (index, payload) in payloads.iter().enumerate() {
                if let Some(route) = c.in_index(index, |c| compose_route(c, cx, payload)) {
                    refs.push(RouteRef { id: route.id, label: route.label });
                }
            }
            check_unique_route_labels(
                c,
                payloads.iter().enumerate().map(|(i, p)| (i, p.label.trim())),
                Some("label"),
            );
            (c.issue_count() == before).then_some(refs)
        }),
        RouteSource::ByReference(ids) => issues.in_field("route_ids", |c| {
            let before = c.issue_count();
            let mut refs = Vec::with_capacity(ids.len());
            let mut labels = Vec::with_capacity(ids.len());
            for (index, raw) in ids.iter().enumerate() {
                let id = RouteId::new(*raw);
                match cx.snapshot().routes.get(&id) {
                    Some(route) => {
                        cx.references_mut().add_route(id);
                        labels.push((index, route.label.as_str()));
                        refs.push(RouteRef { id, label: route.label.clone() });
                    }
                    None => c.in_index(index, |c| {
                        c.push(ErrorKind::ReferenceNotFound, None, format!("route {} does not exist", id))
                    }),
                }
            }
            check_unique_route_labels(c, labels, None);
            (c.issue_count() == before).then_some(refs)
        }),
    }
}

/// Validate a standalone configuration into a commit graph
pub fn validate_configuration(
    mut cx: ValidationContext<'_>,
    payload: &ConfigurationPayload,
) -> Result<ResourceGraph, ValidationReport> {
    let mut issues = IssueCollector::new();
    let configuration = aggregate_configuration(&mut issues, &mut cx, payload);

    match configuration {
        Some(configuration) if issues.is_clean() => {
            Ok(cx.into_graph(CommittedId::Configuration(configuration.id), None, None))
        }
        _ => Err(issues.into_report()),
    }
}
