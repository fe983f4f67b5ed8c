//! Conversions from validated domain types back to wire payloads.
//!
//! Re-validating the payload produced from a committed graph must yield the
//! same graph shape with zero issues. Existing service targets keep their id
//! and every target carries its resolved percentage.

use crate::domain::{
    CertificateBinding, Configuration, Endpoint, EndpointAddress, HealthCheck, MatchCondition,
    ResourceGraph, Route, Rule, RuleTarget, ServiceTarget,
};
use crate::errors::{AglbError, Result};

use super::requests::*;

impl From<&CertificateBinding> for CertificateTableEntry {
    fn from(binding: &CertificateBinding) -> Self {
        Self {
            sni_hostname: binding.sni_hostname.clone(),
            certificate_id: binding.certificate_id.to_string(),
        }
    }
}

impl From<&MatchCondition> for MatchConditionPayload {
    fn from(condition: &MatchCondition) -> Self {
        Self {
            hostname: condition.hostname.clone(),
            match_field: condition.match_field.as_str().to_string(),
            match_value: condition.match_value.clone(),
            affinity_cookie: condition.affinity_cookie.clone(),
            affinity_ttl: condition.affinity_ttl.map(|ttl| ttl.to_string()),
        }
    }
}

impl From<&Endpoint> for EndpointPayload {
    fn from(endpoint: &Endpoint) -> Self {
        let (ip, host) = match &endpoint.address {
            EndpointAddress::Ip(ip) => (Some(ip.to_string()), None),
            EndpointAddress::Host(host) => (None, Some(host.clone())),
        };
        Self {
            ip,
            host,
            port: i64::from(endpoint.port.get()),
            rate_capacity: i64::try_from(endpoint.rate_capacity).unwrap_or(i64::MAX),
        }
    }
}

impl From<&HealthCheck> for HealthCheckPayload {
    fn from(check: &HealthCheck) -> Self {
        Self {
            interval: check.interval as i64,
            timeout: check.timeout as i64,
            unhealthy_threshold: i64::from(check.unhealthy_threshold),
            healthy_threshold: i64::from(check.healthy_threshold),
            path: check.path.clone(),
            host: check.host.clone(),
        }
    }
}

/// Payload for a target inside a rule, referencing the existing target by id
pub fn service_target_payload(target: &ServiceTarget, share: &RuleTarget) -> ServiceTargetPayload {
    ServiceTargetPayload {
        id: Some(target.id.get()),
        label: target.label.clone(),
        endpoints: target.endpoints.iter().map(Into::into).collect(),
        ca_certificate: target.ca_certificate.map(|id| id.to_string()).unwrap_or_default(),
        load_balancing_policy: target.load_balancing_policy.as_str().to_string(),
        healthcheck: (&target.healthcheck).into(),
        percentage: Some(i64::from(share.percentage.get())),
    }
}

/// Rebuild a route payload; every target the route uses must be in `targets`
pub fn route_payload<'a>(
    route: &Route,
    lookup: impl Fn(&RuleTarget) -> Option<&'a ServiceTarget>,
) -> Result<RoutePayload> {
    let rules = route
        .rules
        .iter()
        .map(|rule| rule_payload(rule, &lookup))
        .collect::<Result<Vec<_>>>()?;
    Ok(RoutePayload { label: route.label.clone(), rules })
}

fn rule_payload<'a>(
    rule: &Rule,
    lookup: &impl Fn(&RuleTarget) -> Option<&'a ServiceTarget>,
) -> Result<RulePayload> {
    let service_targets = rule
        .service_targets
        .iter()
        .map(|share| {
            lookup(share)
                .map(|target| service_target_payload(target, share))
                .ok_or_else(|| AglbError::not_found("service_target", share.id.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RulePayload { match_condition: (&rule.match_condition).into(), service_targets })
}

/// Configuration payload with its routes inlined from `graph`
pub fn configuration_payload(configuration: &Configuration, graph: &ResourceGraph) -> Result<ConfigurationPayload> {
    let routes = configuration
        .routes
        .iter()
        .map(|route_ref| {
            let route = graph
                .route(route_ref.id)
                .ok_or_else(|| AglbError::not_found("route", route_ref.id.to_string()))?;
            route_payload(route, |share| graph.service_target(share.id))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ConfigurationPayload {
        label: configuration.label.clone(),
        port: i64::from(configuration.port.get()),
        protocol: configuration.protocol.as_str().to_string(),
        certificate_table: configuration.certificate_table.iter().map(Into::into).collect(),
        routes: Some(routes),
        route_ids: None,
    })
}

/// Rebuild the create payload of a loadbalancer graph with everything inlined
pub fn loadbalancer_payload(graph: &ResourceGraph) -> Result<CreateLoadbalancerPayload> {
    let loadbalancer = graph
        .loadbalancer
        .as_ref()
        .ok_or_else(|| AglbError::internal("graph has no loadbalancer"))?;

    let configurations = loadbalancer
        .configurations
        .iter()
        .map(|configuration_ref| {
            let configuration = graph.configuration(configuration_ref.id).ok_or_else(|| {
                AglbError::not_found("configuration", configuration_ref.id.to_string())
            })?;
            configuration_payload(configuration, graph)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CreateLoadbalancerPayload {
        label: loadbalancer.label.clone(),
        regions: loadbalancer.regions.clone(),
        tags: Some(loadbalancer.tags.clone()),
        configurations: Some(configurations),
    })
}
