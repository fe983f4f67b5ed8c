//! Loadbalancer domain types and the nested resource graph written on commit.

use serde::{Deserialize, Serialize};

use super::configuration::Configuration;
use super::id::{CertificateId, ConfigurationId, LoadbalancerId, RouteId, ServiceTargetId};
use super::route::Route;
use super::service_target::ServiceTarget;

/// Configuration attached to a loadbalancer, by id with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRef {
    pub id: ConfigurationId,
    pub label: String,
}

/// Validated loadbalancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loadbalancer {
    pub id: LoadbalancerId,
    pub label: String,
    pub regions: Vec<String>,
    pub hostname: String,
    pub tags: Vec<String>,
    pub configurations: Vec<ConfigurationRef>,
    /// Bumped on every committed change; 0 until first commit
    #[serde(default)]
    pub version: i64,
}

/// Loadbalancer version a proposal replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supersedes {
    pub id: LoadbalancerId,
    pub version: i64,
}

/// Pre-existing entities a graph depends on; re-checked inside the commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct References {
    pub configurations: Vec<ConfigurationId>,
    pub routes: Vec<RouteId>,
    pub service_targets: Vec<ServiceTargetId>,
    pub certificates: Vec<CertificateId>,
}

impl References {
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
            && self.routes.is_empty()
            && self.service_targets.is_empty()
            && self.certificates.is_empty()
    }

    pub fn add_configuration(&mut self, id: ConfigurationId) {
        if !self.configurations.contains(&id) {
            self.configurations.push(id);
        }
    }

    pub fn add_route(&mut self, id: RouteId) {
        if !self.routes.contains(&id) {
            self.routes.push(id);
        }
    }

    pub fn add_service_target(&mut self, id: ServiceTargetId) {
        if !self.service_targets.contains(&id) {
            self.service_targets.push(id);
        }
    }

    pub fn add_certificate(&mut self, id: CertificateId) {
        if !self.certificates.contains(&id) {
            self.certificates.push(id);
        }
    }
}

/// Root entity of a committed graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CommittedId {
    Loadbalancer(LoadbalancerId),
    Configuration(ConfigurationId),
    Route(RouteId),
}

/// Everything one proposal writes, in one all-or-nothing commit.
///
/// `configurations`, `routes` and `service_targets` hold the entities created
/// or replaced by this proposal; `references` lists the pre-existing ones the
/// graph points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub root: CommittedId,
    pub loadbalancer: Option<Loadbalancer>,
    pub configurations: Vec<Configuration>,
    pub routes: Vec<Route>,
    pub service_targets: Vec<ServiceTarget>,
    pub references: References,
    pub supersedes: Option<Supersedes>,
}

impl ResourceGraph {
    pub fn entity_count(&self) -> usize {
        usize::from(self.loadbalancer.is_some())
            + self.configurations.len()
            + self.routes.len()
            + self.service_targets.len()
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.iter().find(|route| route.id == id)
    }

    pub fn configuration(&self, id: ConfigurationId) -> Option<&Configuration> {
        self.configurations.iter().find(|configuration| configuration.id == id)
    }

    pub fn service_target(&self, id: ServiceTargetId) -> Option<&ServiceTarget> {
        self.service_targets.iter().find(|target| target.id == id)
    }
}
