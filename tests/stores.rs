//! Behaviour shared by every `ResourceStore`, checked against the in-memory
//! store and SQLite

mod common;

use std::sync::Arc;

use aglb::domain::{
    CertificateId, CommittedId, LoadbalancerId, References, ResourceGraph, Supersedes,
};
use aglb::storage::ResourceStore;
use aglb::validation::{ErrorKind, RoutePayload, UpdateLoadbalancerPayload};
use aglb::AglbError;
use serde_json::json;

use common::*;

async fn create_commits_the_whole_graph(store: Arc<dyn ResourceStore>) {
    let services = services(store.clone()).await;
    let certificate = services.certificates.create_certificate(downstream_certificate("edge-cert")).await.unwrap();

    let payload = loadbalancer(
        "edge",
        vec![http_configuration("web", 80), https_configuration("secure", certificate.id.get())],
    );
    let created = services.loadbalancers.create_loadbalancer(payload).await.unwrap();
    assert_eq!(created.configurations.len(), 2);

    for configuration_ref in &created.configurations {
        let configuration = store.get_configuration_by_id(configuration_ref.id).await.unwrap().unwrap();
        for route_ref in &configuration.routes {
            let route = store.get_route_by_id(route_ref.id).await.unwrap().unwrap();
            for target_id in route.service_target_ids() {
                assert!(store.get_service_target_by_id(target_id).await.unwrap().is_some());
            }
        }
    }
    assert!(store.max_id().await.unwrap() >= created.id.get());
}

async fn invalid_request_writes_nothing(store: Arc<dyn ResourceStore>) {
    let services = services(store.clone()).await;
    let before = store.max_id().await.unwrap();

    let mut bad = http_configuration("web", 80);
    bad["routes"][0]["rules"][0]["service_targets"][0]["healthcheck"]["timeout"] = json!(30);
    let payload = loadbalancer("edge", vec![bad, https_configuration("secure", 9999)]);

    let err = services.loadbalancers.create_loadbalancer(payload).await.unwrap_err();
    let AglbError::Validation(report) = err else { panic!("expected validation error") };
    assert!(report.contains(ErrorKind::HealthCheckTiming));
    assert!(report.contains(ErrorKind::ReferenceNotFound));
    assert_eq!(store.max_id().await.unwrap(), before);
}

async fn stale_update_conflicts(store: Arc<dyn ResourceStore>) {
    let services = services(store.clone()).await;
    let created = services
        .loadbalancers
        .create_loadbalancer(loadbalancer("edge", vec![http_configuration("web", 80)]))
        .await
        .unwrap();

    let update = |region: &str| UpdateLoadbalancerPayload {
        label: "edge".into(),
        regions: vec![region.into()],
        tags: None,
        configuration_ids: Some(created.configurations.iter().map(|c| c.id.get()).collect()),
    };
    services.loadbalancers.update_loadbalancer(created.id, update("eu-west")).await.unwrap();

    // Replaying a graph validated against version 1 after version 2 landed
    let mut superseded = created.clone();
    superseded.version = 2;
    let stale = ResourceGraph {
        root: CommittedId::Loadbalancer(created.id),
        loadbalancer: Some(superseded),
        configurations: Vec::new(),
        routes: Vec::new(),
        service_targets: Vec::new(),
        references: References::default(),
        supersedes: Some(Supersedes { id: created.id, version: 1 }),
    };

    let result = store.commit(&stale).await;
    assert!(matches!(result, Err(AglbError::Conflict { .. })));

    let current = store.get_loadbalancer_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.regions, vec!["eu-west".to_string()]);
}

async fn referenced_certificate_is_protected(store: Arc<dyn ResourceStore>) {
    let services = services(store.clone()).await;
    let certificate = services.certificates.create_certificate(downstream_certificate("edge-cert")).await.unwrap();
    services
        .loadbalancers
        .create_configuration(serde_json::from_value(https_configuration("secure", certificate.id.get())).unwrap())
        .await
        .unwrap();

    let result = services.certificates.delete_certificate(certificate.id).await;
    assert!(matches!(result, Err(AglbError::Conflict { .. })));

    let missing = services.certificates.delete_certificate(CertificateId::new(4242)).await;
    assert!(matches!(missing, Err(AglbError::NotFound { .. })));
}

async fn ids_continue_after_reopen(store: Arc<dyn ResourceStore>) {
    let first = services(store.clone()).await;
    let created = first
        .loadbalancers
        .create_loadbalancer(loadbalancer("edge", vec![http_configuration("web", 80)]))
        .await
        .unwrap();

    let second = services(store.clone()).await;
    let next = second
        .loadbalancers
        .create_loadbalancer(loadbalancer("edge-two", vec![http_configuration("web", 80)]))
        .await
        .unwrap();
    assert!(next.id > created.id);
    assert!(second.loadbalancers.get_loadbalancer(LoadbalancerId::new(created.id.get())).await.is_ok());
}

fn route_payload(value: serde_json::Value) -> RoutePayload {
    serde_json::from_value(value).expect("route payload parses")
}

async fn committed_service_target_is_immutable(store: Arc<dyn ResourceStore>) {
    let services = services(store.clone()).await;
    let blue = services
        .loadbalancers
        .create_route(route_payload(route("blue-route", vec![service_target("blue", "10.0.0.1")])))
        .await
        .unwrap();
    let target_id = blue.rules[0].service_targets[0].id;

    let mut changed = service_target("green", "10.0.0.2");
    changed["id"] = json!(target_id.get());
    let before = store.max_id().await.unwrap();
    let err = services
        .loadbalancers
        .create_route(route_payload(route("green-route", vec![changed])))
        .await
        .unwrap_err();
    let AglbError::Validation(report) = err else { panic!("expected validation error, got {err:?}") };
    assert_eq!(report.kinds(), vec![ErrorKind::Conflict]);
    assert_eq!(report.issues[0].field, "rules[0].service_targets[0].id");
    assert_eq!(store.max_id().await.unwrap(), before);

    let stored = store.get_service_target_by_id(target_id).await.unwrap().unwrap();
    assert_eq!(stored.label, "blue");
    let first_route = store.get_route_by_id(blue.id).await.unwrap().unwrap();
    assert_eq!(first_route.rules[0].service_targets[0].label, stored.label);
}

async fn identical_service_target_is_shared(store: Arc<dyn ResourceStore>) {
    let services = services(store.clone()).await;
    let blue = services
        .loadbalancers
        .create_route(route_payload(route("blue-route", vec![service_target("blue", "10.0.0.1")])))
        .await
        .unwrap();
    let target_id = blue.rules[0].service_targets[0].id;
    let original = store.get_service_target_by_id(target_id).await.unwrap().unwrap();

    let mut same = service_target("blue", "10.0.0.1");
    same["id"] = json!(target_id.get());
    let second = services
        .loadbalancers
        .create_route(route_payload(route("blue-route-two", vec![same])))
        .await
        .unwrap();

    assert_eq!(second.rules[0].service_targets[0].id, target_id);
    assert_eq!(store.get_service_target_by_id(target_id).await.unwrap().unwrap(), original);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_on_disk_end_in_success_or_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let services = services(store.clone()).await;
    let created = services
        .loadbalancers
        .create_loadbalancer(loadbalancer("edge", vec![http_configuration("web", 80)]))
        .await
        .unwrap();
    let configuration_ids: Vec<i64> = created.configurations.iter().map(|c| c.id.get()).collect();

    let regions = ["us-east", "us-west", "eu-west", "eu-north", "ap-south"];
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let services = services.clone();
            let payload = UpdateLoadbalancerPayload {
                label: format!("edge-{i}"),
                regions: vec![regions[i % regions.len()].to_string()],
                tags: None,
                configuration_ids: Some(configuration_ids.clone()),
            };
            tokio::spawn(async move { services.loadbalancers.update_loadbalancer(created.id, payload).await })
        })
        .collect();

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(AglbError::Conflict { .. }) => {}
            Err(other) => panic!("concurrent update failed with {other:?}"),
        }
    }

    assert!(committed >= 1);
    let current = store.get_loadbalancer_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(current.version, 1 + committed);
}

macro_rules! store_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(memory_store()).await;
                }
            )*
        }

        mod sqlite {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(sqlite_store().await).await;
                }
            )*
        }
    };
}

store_tests!(
    create_commits_the_whole_graph,
    invalid_request_writes_nothing,
    stale_update_conflicts,
    referenced_certificate_is_protected,
    ids_continue_after_reopen,
    committed_service_target_is_immutable,
    identical_service_target_is_shared,
);
