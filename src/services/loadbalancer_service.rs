//! Loadbalancer business logic service
//!
//! Drives every configuration change through the proposal lifecycle:
//! load a snapshot of the referenced entities, validate against it, then
//! hand the graph to the store for an atomic commit.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::{
    CommittedId, Configuration, ConfigurationId, IdSequence, Loadbalancer, LoadbalancerId,
    ResourceGraph, Route, RouteId,
};
use crate::errors::{AglbError, Result};
use crate::storage::{load_snapshot, ResourceStore};
use crate::validation::{
    ConfigurationPayload, CreateLoadbalancerPayload, Proposal, ProposalPayload, RequestedIds,
    RoutePayload, UpdateLoadbalancerPayload, ValidationContext,
};

/// Service for validating and committing loadbalancer graphs
#[derive(Clone)]
pub struct LoadbalancerService {
    store: Arc<dyn ResourceStore>,
    ids: IdSequence,
    base_domain: String,
}

impl LoadbalancerService {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        ids: IdSequence,
        base_domain: impl Into<String>,
    ) -> Self {
        Self { store, ids, base_domain: base_domain.into() }
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Validate a create payload without committing it.
    ///
    /// Synthetic ids handed out here are never reused, so a later create of
    /// the same payload gets different ids.
    #[instrument(skip(self, payload), fields(label = %payload.label), name = "validate_loadbalancer")]
    pub async fn validate_create(&self, payload: CreateLoadbalancerPayload) -> Result<ResourceGraph> {
        let requested = RequestedIds::from_create(&payload);
        let mut proposal = self
            .validated(ProposalPayload::CreateLoadbalancer(payload), &requested, None)
            .await?;
        let graph = proposal.graph_for_commit()?.clone();
        proposal.reject("dry run")?;
        Ok(graph)
    }

    #[instrument(skip(self, payload), fields(label = %payload.label), name = "create_loadbalancer")]
    pub async fn create_loadbalancer(&self, payload: CreateLoadbalancerPayload) -> Result<Loadbalancer> {
        let requested = RequestedIds::from_create(&payload);
        let proposal = self
            .validated(ProposalPayload::CreateLoadbalancer(payload), &requested, None)
            .await?;
        let graph = self.commit(proposal).await?;
        let loadbalancer = committed_loadbalancer(graph)?;

        info!(
            loadbalancer_id = %loadbalancer.id,
            hostname = %loadbalancer.hostname,
            configurations = loadbalancer.configurations.len(),
            "Loadbalancer created"
        );
        Ok(loadbalancer)
    }

    /// Replace a loadbalancer. Concurrent updates of the same loadbalancer
    /// fail with a conflict at commit.
    #[instrument(skip(self, payload), fields(loadbalancer_id = %id), name = "update_loadbalancer")]
    pub async fn update_loadbalancer(
        &self,
        id: LoadbalancerId,
        payload: UpdateLoadbalancerPayload,
    ) -> Result<Loadbalancer> {
        if self.store.get_loadbalancer_by_id(id).await?.is_none() {
            return Err(AglbError::not_found("loadbalancer", id.to_string()));
        }

        let requested = RequestedIds::from_update(&payload);
        let proposal = self
            .validated(ProposalPayload::UpdateLoadbalancer { id, payload }, &requested, Some(id))
            .await?;
        let graph = self.commit(proposal).await?;
        let loadbalancer = committed_loadbalancer(graph)?;

        info!(
            loadbalancer_id = %loadbalancer.id,
            version = loadbalancer.version,
            "Loadbalancer updated"
        );
        Ok(loadbalancer)
    }

    #[instrument(skip(self, payload), fields(label = %payload.label), name = "create_configuration")]
    pub async fn create_configuration(&self, payload: ConfigurationPayload) -> Result<Configuration> {
        let requested = RequestedIds::from_configuration(&payload);
        let proposal = self
            .validated(ProposalPayload::Configuration(payload), &requested, None)
            .await?;
        let graph = self.commit(proposal).await?;

        let configuration = match graph.root {
            CommittedId::Configuration(id) => graph.configuration(id).cloned(),
            _ => None,
        }
        .ok_or_else(|| AglbError::internal("configuration graph has no root configuration"))?;

        info!(
            configuration_id = %configuration.id,
            protocol = %configuration.protocol,
            port = %configuration.port,
            "Configuration created"
        );
        Ok(configuration)
    }

    #[instrument(skip(self, payload), fields(label = %payload.label), name = "create_route")]
    pub async fn create_route(&self, payload: RoutePayload) -> Result<Route> {
        let requested = RequestedIds::from_route(&payload);
        let proposal = self.validated(ProposalPayload::Route(payload), &requested, None).await?;
        let graph = self.commit(proposal).await?;

        let route = match graph.root {
            CommittedId::Route(id) => graph.route(id).cloned(),
            _ => None,
        }
        .ok_or_else(|| AglbError::internal("route graph has no root route"))?;

        info!(route_id = %route.id, rules = route.rules.len(), "Route created");
        Ok(route)
    }

    pub async fn get_loadbalancer(&self, id: LoadbalancerId) -> Result<Loadbalancer> {
        self.store
            .get_loadbalancer_by_id(id)
            .await?
            .ok_or_else(|| AglbError::not_found("loadbalancer", id.to_string()))
    }

    pub async fn get_configuration(&self, id: ConfigurationId) -> Result<Configuration> {
        self.store
            .get_configuration_by_id(id)
            .await?
            .ok_or_else(|| AglbError::not_found("configuration", id.to_string()))
    }

    pub async fn get_route(&self, id: RouteId) -> Result<Route> {
        self.store
            .get_route_by_id(id)
            .await?
            .ok_or_else(|| AglbError::not_found("route", id.to_string()))
    }

    /// Draft a proposal and validate it against a fresh snapshot
    async fn validated(
        &self,
        payload: ProposalPayload,
        requested: &RequestedIds,
        loadbalancer: Option<LoadbalancerId>,
    ) -> Result<Proposal> {
        let snapshot = load_snapshot(self.store.as_ref(), requested, loadbalancer).await?;
        let mut proposal = Proposal::new(payload);
        let cx = ValidationContext::new(&snapshot, &self.ids, &self.base_domain);

        let outcome = proposal.validate(cx).map(|_| ());
        if let Err(err) = outcome {
            if let AglbError::Validation(report) = &err {
                warn!(
                    proposal = proposal.payload().kind(),
                    issues = report.len(),
                    kinds = ?report.kinds(),
                    "Proposal rejected by validation"
                );
            }
            return Err(err);
        }
        Ok(proposal)
    }

    async fn commit(&self, mut proposal: Proposal) -> Result<ResourceGraph> {
        let outcome = self.store.commit(proposal.graph_for_commit()?).await;
        if let Err(err) = &outcome {
            warn!(proposal = proposal.payload().kind(), error = %err, "Commit failed");
        }
        proposal.finish_commit(outcome)?;

        proposal
            .graph()
            .cloned()
            .ok_or_else(|| AglbError::internal("committed proposal has no graph"))
    }
}

fn committed_loadbalancer(graph: ResourceGraph) -> Result<Loadbalancer> {
    graph
        .loadbalancer
        .ok_or_else(|| AglbError::internal("loadbalancer graph has no loadbalancer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::validation::ErrorKind;

    fn service() -> LoadbalancerService {
        LoadbalancerService::new(Arc::new(InMemoryStore::new()), IdSequence::default(), "example.net")
    }

    fn create_payload(label: &str) -> CreateLoadbalancerPayload {
        serde_json::from_value(serde_json::json!({
            "label": label,
            "regions": ["us-east"],
            "configurations": [{
                "label": "web",
                "port": 80,
                "protocol": "HTTP",
                "routes": [{
                    "label": "root",
                    "rules": [{
                        "match_condition": {
                            "hostname": "",
                            "match_field": "path_prefix",
                            "match_value": "/"
                        },
                        "service_targets": [
                            {
                                "label": "blue",
                                "endpoints": [{"ip": "10.0.0.1", "port": 8080, "rate_capacity": 100}],
                                "load_balancing_policy": "round_robin",
                                "healthcheck": {
                                    "interval": 10, "timeout": 5,
                                    "unhealthy_threshold": 3, "healthy_threshold": 2
                                }
                            }
                        ]
                    }]
                }]
            }]
        }))
        .expect("payload parses")
    }

    #[tokio::test]
    async fn create_commits_and_fetches_back() {
        let service = service();
        let created = service.create_loadbalancer(create_payload("edge")).await.unwrap();

        assert_eq!(created.version, 1);
        let fetched = service.get_loadbalancer(created.id).await.unwrap();
        assert_eq!(fetched, created);

        let configuration = service.get_configuration(created.configurations[0].id).await.unwrap();
        assert_eq!(configuration.routes.len(), 1);
    }

    #[tokio::test]
    async fn dry_run_commits_nothing() {
        let service = service();
        let graph = service.validate_create(create_payload("edge")).await.unwrap();
        let id = graph.loadbalancer.as_ref().unwrap().id;

        let result = service.get_loadbalancer(id).await;
        assert!(matches!(result, Err(AglbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn update_of_missing_loadbalancer_is_not_found() {
        let service = service();
        let payload = UpdateLoadbalancerPayload {
            label: "edge".into(),
            regions: vec!["us-east".into()],
            tags: None,
            configuration_ids: None,
        };
        let result = service.update_loadbalancer(LoadbalancerId::new(42), payload).await;
        assert!(matches!(result, Err(AglbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn update_bumps_version_and_keeps_configurations() {
        let service = service();
        let created = service.create_loadbalancer(create_payload("edge")).await.unwrap();

        let payload = UpdateLoadbalancerPayload {
            label: "edge-renamed".into(),
            regions: vec!["eu-west".into()],
            tags: Some(vec!["prod".into()]),
            configuration_ids: Some(vec![created.configurations[0].id.get()]),
        };
        let updated = service.update_loadbalancer(created.id, payload).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.configurations, created.configurations);
    }

    #[tokio::test]
    async fn invalid_payload_reports_every_issue() {
        let service = service();
        let mut payload = create_payload("");
        payload.regions.clear();

        let err = service.create_loadbalancer(payload).await.unwrap_err();
        let AglbError::Validation(report) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(report.len() >= 2);
        assert!(report.of_kind(ErrorKind::Required).any(|issue| issue.field == "regions"));
    }
}
