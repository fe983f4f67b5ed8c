//! Per-request validation context.
//!
//! Validation never touches the store directly. The service layer first
//! gathers every id a payload mentions ([`RequestedIds`]), loads those
//! entities into a point-in-time [`Snapshot`], and then runs the pure
//! validators against it. New entities are accumulated in the context and
//! handed out as one [`ResourceGraph`].

use std::collections::{BTreeSet, HashMap};

use crate::domain::{
    Certificate, CertificateId, CommittedId, Configuration, ConfigurationId, IdSequence,
    Loadbalancer, References, ResourceGraph, Route, RouteId, ServiceTarget, ServiceTargetId,
    Supersedes,
};

use super::error::{ErrorKind, IssueCollector};
use super::requests::{
    ConfigurationPayload, CreateLoadbalancerPayload, RoutePayload, UpdateLoadbalancerPayload,
};

/// Existing entities visible to one request
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub loadbalancer: Option<Loadbalancer>,
    pub configurations: HashMap<ConfigurationId, Configuration>,
    pub routes: HashMap<RouteId, Route>,
    pub service_targets: HashMap<ServiceTargetId, ServiceTarget>,
    pub certificates: HashMap<CertificateId, Certificate>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificates.insert(certificate.id, certificate);
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.insert(route.id, route);
        self
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configurations.insert(configuration.id, configuration);
        self
    }

    pub fn with_service_target(mut self, target: ServiceTarget) -> Self {
        self.service_targets.insert(target.id, target);
        self
    }

    pub fn with_loadbalancer(mut self, loadbalancer: Loadbalancer) -> Self {
        self.loadbalancer = Some(loadbalancer);
        self
    }

    /// Make every entity written by `graph` visible, as if it had been committed
    pub fn absorb(&mut self, graph: &ResourceGraph) {
        for configuration in &graph.configurations {
            self.configurations.insert(configuration.id, configuration.clone());
        }
        for route in &graph.routes {
            self.routes.insert(route.id, route.clone());
        }
        for target in &graph.service_targets {
            self.service_targets.insert(target.id, target.clone());
        }
        if let Some(loadbalancer) = &graph.loadbalancer {
            self.loadbalancer = Some(loadbalancer.clone());
        }
    }
}

/// Every id a payload refers to, gathered before the snapshot is loaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedIds {
    pub configurations: BTreeSet<ConfigurationId>,
    pub routes: BTreeSet<RouteId>,
    pub service_targets: BTreeSet<ServiceTargetId>,
    pub certificates: BTreeSet<CertificateId>,
}

impl RequestedIds {
    pub fn from_create(payload: &CreateLoadbalancerPayload) -> Self {
        let mut ids = Self::default();
        for configuration in payload.configurations.iter().flatten() {
            ids.collect_configuration(configuration);
        }
        ids
    }

    pub fn from_update(payload: &UpdateLoadbalancerPayload) -> Self {
        let mut ids = Self::default();
        for raw in payload.configuration_ids.iter().flatten() {
            ids.configurations.insert(ConfigurationId::new(*raw));
        }
        ids
    }

    pub fn from_configuration(payload: &ConfigurationPayload) -> Self {
        let mut ids = Self::default();
        ids.collect_configuration(payload);
        ids
    }

    pub fn from_route(payload: &RoutePayload) -> Self {
        let mut ids = Self::default();
        ids.collect_route(payload);
        ids
    }

    fn collect_configuration(&mut self, payload: &ConfigurationPayload) {
        for entry in &payload.certificate_table {
            if let Ok(id) = entry.certificate_id.parse() {
                self.certificates.insert(id);
            }
        }
        for route in payload.routes.iter().flatten() {
            self.collect_route(route);
        }
        for raw in payload.route_ids.iter().flatten() {
            self.routes.insert(RouteId::new(*raw));
        }
    }

    fn collect_route(&mut self, payload: &RoutePayload) {
        for target in payload.rules.iter().flat_map(|rule| rule.service_targets.iter()) {
            if let Some(raw) = target.id {
                self.service_targets.insert(ServiceTargetId::new(raw));
            }
            if let Ok(id) = target.ca_certificate.parse() {
                self.certificates.insert(id);
            }
        }
    }
}

/// Snapshot, id source and the graph under construction
#[derive(Debug)]
pub struct ValidationContext<'a> {
    snapshot: &'a Snapshot,
    ids: &'a IdSequence,
    base_domain: &'a str,
    configurations: Vec<Configuration>,
    routes: Vec<Route>,
    service_targets: Vec<ServiceTarget>,
    references: References,
}

impl<'a> ValidationContext<'a> {
    pub fn new(snapshot: &'a Snapshot, ids: &'a IdSequence, base_domain: &'a str) -> Self {
        Self {
            snapshot,
            ids,
            base_domain,
            configurations: Vec::new(),
            routes: Vec::new(),
            service_targets: Vec::new(),
            references: References::default(),
        }
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    pub fn base_domain(&self) -> &'a str {
        self.base_domain
    }

    pub fn next_id<T: From<i64>>(&self) -> T {
        self.ids.next_id()
    }

    pub fn references_mut(&mut self) -> &mut References {
        &mut self.references
    }

    pub(crate) fn record_configuration(&mut self, configuration: Configuration) {
        self.configurations.push(configuration);
    }

    pub(crate) fn record_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Record a service target. The same id may appear in several rules, but
    /// only with identical content.
    pub(crate) fn record_service_target(
        &mut self,
        issues: &mut IssueCollector,
        target: ServiceTarget,
    ) {
        match self.service_targets.iter().find(|existing| existing.id == target.id) {
            Some(existing) if *existing == target => {}
            Some(_) => issues.push(
                ErrorKind::Conflict,
                Some("id"),
                format!("service target {} is defined more than once with different content", target.id),
            ),
            None => self.service_targets.push(target),
        }
    }

    /// Consume the context into the graph to commit
    pub fn into_graph(
        self,
        root: CommittedId,
        loadbalancer: Option<Loadbalancer>,
        supersedes: Option<Supersedes>,
    ) -> ResourceGraph {
        ResourceGraph {
            root,
            loadbalancer,
            configurations: self.configurations,
            routes: self.routes,
            service_targets: self.service_targets,
            references: self.references,
            supersedes,
        }
    }
}
