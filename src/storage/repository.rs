//! # Resource Store
//!
//! The persistence seam of the service. Validation only reads a
//! [`Snapshot`] loaded through this trait; the only write is
//! [`ResourceStore::commit`], which persists a whole [`ResourceGraph`] or
//! nothing.

use async_trait::async_trait;
use tracing::Instrument;

use crate::domain::{
    Certificate, CertificateId, CommittedId, Configuration, ConfigurationId, Loadbalancer,
    LoadbalancerId, NewCertificate, ResourceGraph, Route, RouteId, ServiceTarget,
    ServiceTargetId,
};
use crate::errors::{AglbError, Result};
use crate::validation::{RequestedIds, Snapshot};

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_loadbalancer_by_id(&self, id: LoadbalancerId) -> Result<Option<Loadbalancer>>;

    async fn get_configuration_by_id(&self, id: ConfigurationId) -> Result<Option<Configuration>>;

    async fn get_route_by_id(&self, id: RouteId) -> Result<Option<Route>>;

    async fn get_service_target_by_id(&self, id: ServiceTargetId) -> Result<Option<ServiceTarget>>;

    async fn get_certificate_by_id(&self, id: CertificateId) -> Result<Option<Certificate>>;

    /// Highest id in use across every entity kind, 0 when empty
    async fn max_id(&self) -> Result<i64>;

    /// Persist `graph` atomically.
    ///
    /// Every id in `graph.references` must still exist (`NotFound`
    /// otherwise). When the graph supersedes a loadbalancer, the stored
    /// version must still be the one validation saw, and new entities must
    /// not collide with stored ids (`Conflict` in both cases).
    async fn commit(&self, graph: &ResourceGraph) -> Result<CommittedId>;

    async fn insert_certificate(&self, certificate: &NewCertificate) -> Result<Certificate>;

    /// Remove a certificate; `Conflict` while a configuration or service
    /// target still points at it
    async fn delete_certificate(&self, id: CertificateId) -> Result<()>;
}

/// Load every requested entity into a point-in-time snapshot. Ids that do
/// not exist are simply absent; validation reports them.
pub async fn load_snapshot(
    store: &dyn ResourceStore,
    requested: &RequestedIds,
    loadbalancer: Option<LoadbalancerId>,
) -> Result<Snapshot> {
    let span = crate::db_span!("load_snapshot", loadbalancer_id = ?loadbalancer);
    read_snapshot(store, requested, loadbalancer).instrument(span).await
}

async fn read_snapshot(
    store: &dyn ResourceStore,
    requested: &RequestedIds,
    loadbalancer: Option<LoadbalancerId>,
) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();

    if let Some(id) = loadbalancer {
        snapshot.loadbalancer = store.get_loadbalancer_by_id(id).await?;
    }
    for id in &requested.configurations {
        if let Some(configuration) = store.get_configuration_by_id(*id).await? {
            snapshot = snapshot.with_configuration(configuration);
        }
    }
    for id in &requested.routes {
        if let Some(route) = store.get_route_by_id(*id).await? {
            snapshot = snapshot.with_route(route);
        }
    }
    for id in &requested.service_targets {
        if let Some(target) = store.get_service_target_by_id(*id).await? {
            snapshot = snapshot.with_service_target(target);
        }
    }
    for id in &requested.certificates {
        if let Some(certificate) = store.get_certificate_by_id(*id).await? {
            snapshot = snapshot.with_certificate(certificate);
        }
    }

    tracing::debug!(
        configurations = snapshot.configurations.len(),
        routes = snapshot.routes.len(),
        service_targets = snapshot.service_targets.len(),
        certificates = snapshot.certificates.len(),
        "Loaded validation snapshot"
    );

    Ok(snapshot)
}

/// Certificates a graph entity points at, with the owning entity
pub(crate) fn certificate_owners(graph: &ResourceGraph) -> Vec<(CertificateId, &'static str, i64)> {
    let mut owners = Vec::new();
    for configuration in &graph.configurations {
        for binding in &configuration.certificate_table {
            owners.push((binding.certificate_id, "configuration", configuration.id.get()));
        }
    }
    for target in &graph.service_targets {
        if let Some(ca) = target.ca_certificate {
            owners.push((ca, "service_target", target.id.get()));
        }
    }
    owners
}

/// The version check shared by every store implementation
pub(crate) fn check_supersedes(
    graph: &ResourceGraph,
    stored_version: Option<i64>,
) -> Result<()> {
    match (&graph.supersedes, &graph.loadbalancer, stored_version) {
        (Some(supersedes), _, None) => {
            Err(AglbError::not_found("loadbalancer", supersedes.id.to_string()))
        }
        (Some(supersedes), _, Some(current)) if current != supersedes.version => {
            Err(AglbError::conflict(
                format!(
                    "loadbalancer {} changed since validation (expected version {}, found {})",
                    supersedes.id, supersedes.version, current
                ),
                "loadbalancer",
            ))
        }
        (None, Some(loadbalancer), Some(_)) => Err(AglbError::conflict(
            format!("loadbalancer id {} is already in use", loadbalancer.id),
            "loadbalancer",
        )),
        _ => Ok(()),
    }
}
