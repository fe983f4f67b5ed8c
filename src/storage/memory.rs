//! In-memory [`ResourceStore`] for tests and `aglb validate`.
//!
//! A commit checks everything first and only then mutates, all under one
//! write lock, so readers never observe half a graph.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    Certificate, CertificateId, CommittedId, Configuration, ConfigurationId, Loadbalancer,
    LoadbalancerId, NewCertificate, ResourceGraph, Route, RouteId, ServiceTarget,
    ServiceTargetId,
};
use crate::errors::{AglbError, Result};
use crate::storage::repository::{check_supersedes, ResourceStore};

#[derive(Debug, Default)]
struct State {
    loadbalancers: HashMap<LoadbalancerId, Loadbalancer>,
    configurations: HashMap<ConfigurationId, Configuration>,
    routes: HashMap<RouteId, Route>,
    service_targets: HashMap<ServiceTargetId, ServiceTarget>,
    certificates: HashMap<CertificateId, NewCertificate>,
}

impl State {
    fn max_id(&self) -> i64 {
        let ids = self
            .loadbalancers
            .keys()
            .map(|id| id.get())
            .chain(self.configurations.keys().map(|id| id.get()))
            .chain(self.routes.keys().map(|id| id.get()))
            .chain(self.service_targets.keys().map(|id| id.get()))
            .chain(self.certificates.keys().map(|id| id.get()));
        ids.max().unwrap_or(0)
    }

    fn check_references(&self, graph: &ResourceGraph) -> Result<()> {
        let references = &graph.references;
        if let Some(id) = references.configurations.iter().find(|id| !self.configurations.contains_key(id)) {
            return Err(AglbError::not_found("configuration", id.to_string()));
        }
        if let Some(id) = references.routes.iter().find(|id| !self.routes.contains_key(id)) {
            return Err(AglbError::not_found("route", id.to_string()));
        }
        if let Some(id) = references.service_targets.iter().find(|id| !self.service_targets.contains_key(id)) {
            return Err(AglbError::not_found("service_target", id.to_string()));
        }
        if let Some(id) = references.certificates.iter().find(|id| !self.certificates.contains_key(id)) {
            return Err(AglbError::not_found("certificate", id.to_string()));
        }
        Ok(())
    }

    fn check_collisions(&self, graph: &ResourceGraph) -> Result<()> {
        if let Some(configuration) =
            graph.configurations.iter().find(|c| self.configurations.contains_key(&c.id))
        {
            return Err(collision("configuration", configuration.id.get()));
        }
        if let Some(route) = graph.routes.iter().find(|r| self.routes.contains_key(&r.id)) {
            return Err(collision("route", route.id.get()));
        }
        if let Some(target) = graph.service_targets.iter().find(|t| {
            self.service_targets.contains_key(&t.id)
                && !graph.references.service_targets.contains(&t.id)
        }) {
            return Err(collision("service_target", target.id.get()));
        }
        Ok(())
    }

    fn is_certificate_referenced(&self, id: CertificateId) -> bool {
        self.configurations
            .values()
            .any(|c| c.certificate_table.iter().any(|binding| binding.certificate_id == id))
            || self.service_targets.values().any(|t| t.ca_certificate == Some(id))
    }
}

fn collision(resource_type: &str, id: i64) -> AglbError {
    AglbError::conflict(format!("{} id {} is already in use", resource_type, id), resource_type)
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_loadbalancer_by_id(&self, id: LoadbalancerId) -> Result<Option<Loadbalancer>> {
        Ok(self.state.read().await.loadbalancers.get(&id).cloned())
    }

    async fn get_configuration_by_id(&self, id: ConfigurationId) -> Result<Option<Configuration>> {
        Ok(self.state.read().await.configurations.get(&id).cloned())
    }

    async fn get_route_by_id(&self, id: RouteId) -> Result<Option<Route>> {
        Ok(self.state.read().await.routes.get(&id).cloned())
    }

    async fn get_service_target_by_id(&self, id: ServiceTargetId) -> Result<Option<ServiceTarget>> {
        Ok(self.state.read().await.service_targets.get(&id).cloned())
    }

    async fn get_certificate_by_id(&self, id: CertificateId) -> Result<Option<Certificate>> {
        Ok(self.state.read().await.certificates.get(&id).map(NewCertificate::summary))
    }

    async fn max_id(&self) -> Result<i64> {
        Ok(self.state.read().await.max_id())
    }

    async fn commit(&self, graph: &ResourceGraph) -> Result<CommittedId> {
        let mut state = self.state.write().await;

        state.check_references(graph)?;
        let stored_version = graph
            .loadbalancer
            .as_ref()
            .and_then(|loadbalancer| state.loadbalancers.get(&loadbalancer.id))
            .map(|loadbalancer| loadbalancer.version);
        check_supersedes(graph, stored_version)?;
        state.check_collisions(graph)?;

        for target in &graph.service_targets {
            if !graph.references.service_targets.contains(&target.id) {
                state.service_targets.insert(target.id, target.clone());
            }
        }
        for route in &graph.routes {
            state.routes.insert(route.id, route.clone());
        }
        for configuration in &graph.configurations {
            state.configurations.insert(configuration.id, configuration.clone());
        }
        if let Some(loadbalancer) = &graph.loadbalancer {
            state.loadbalancers.insert(loadbalancer.id, loadbalancer.clone());
        }

        tracing::debug!(root = ?graph.root, entities = graph.entity_count(), "Committed graph in memory");
        Ok(graph.root)
    }

    async fn insert_certificate(&self, certificate: &NewCertificate) -> Result<Certificate> {
        let mut state = self.state.write().await;
        if state.certificates.contains_key(&certificate.id) {
            return Err(collision("certificate", certificate.id.get()));
        }
        state.certificates.insert(certificate.id, certificate.clone());
        Ok(certificate.summary())
    }

    async fn delete_certificate(&self, id: CertificateId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.certificates.contains_key(&id) {
            return Err(AglbError::not_found("certificate", id.to_string()));
        }
        if state.is_certificate_referenced(id) {
            return Err(AglbError::conflict(
                format!("certificate {} is still referenced", id),
                "certificate",
            ));
        }
        state.certificates.remove(&id);
        Ok(())
    }
}
