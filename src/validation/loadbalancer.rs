//! Loadbalancer-level aggregation: regions, tags, configuration sets and the
//! derived hostname.

use std::collections::{BTreeSet, HashSet};

use crate::domain::{
    CommittedId, ConfigurationId, ConfigurationRef, Loadbalancer, LoadbalancerId, ResourceGraph,
    Supersedes,
};

use super::configuration::aggregate_configuration;
use super::context::ValidationContext;
use super::error::{ErrorKind, FieldError, IssueCollector, ValidationReport};
use super::primitives::{is_valid_domain_format, validate_label, validate_region, MAX_LABEL_LEN};
use super::requests::{ConfigurationPayload, CreateLoadbalancerPayload, UpdateLoadbalancerPayload};

const MAX_DNS_LABEL_LEN: usize = 63;

/// Where a loadbalancer's configurations come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationSource<'a> {
    Inline(&'a [ConfigurationPayload]),
    ByReference(&'a [i64]),
}

/// Lower-cased, sorted, de-duplicated region set; never empty
pub fn normalize_regions(
    issues: &mut IssueCollector,
    regions: &[String],
) -> Option<Vec<String>> {
    if regions.is_empty() {
        issues.push(ErrorKind::Required, Some("regions"), "at least one region is required");
        return None;
    }

    let before = issues.issue_count();
    let normalized: BTreeSet<String> = issues.in_field("regions", |c| {
        regions
            .iter()
            .enumerate()
            .filter_map(|(index, region)| c.in_index(index, |c| c.check_here(validate_region(region))))
            .collect()
    });
    (issues.issue_count() == before).then(|| normalized.into_iter().collect())
}

/// Sorted, de-duplicated tags
pub fn normalize_tags(issues: &mut IssueCollector, tags: Option<&[String]>) -> Option<Vec<String>> {
    let before = issues.issue_count();
    let normalized: BTreeSet<String> = issues.in_field("tags", |c| {
        tags.unwrap_or_default()
            .iter()
            .enumerate()
            .filter_map(|(index, tag)| c.in_index(index, |c| c.check_here(validate_tag(tag))))
            .collect()
    });
    (issues.issue_count() == before).then(|| normalized.into_iter().collect())
}

fn validate_tag(tag: &str) -> Result<String, FieldError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(FieldError::required("tag cannot be empty"));
    }
    if tag.len() > MAX_LABEL_LEN {
        return Err(FieldError::format(format!(
            "tag exceeds maximum length of {} characters",
            MAX_LABEL_LEN
        )));
    }
    Ok(tag.to_string())
}

/// `<label>.<first region>.aglb.<base domain>`, made DNS-safe.
///
/// The label part is capped at one DNS label (63 characters). A label with
/// no usable characters falls back to `lb-<id>`.
pub fn derive_hostname(
    id: LoadbalancerId,
    label: &str,
    regions: &[String],
    base_domain: &str,
) -> String {
    let sanitized: String = label
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .take(MAX_DNS_LABEL_LEN)
        .collect();
    let host_label = match sanitized.trim_matches('-') {
        "" => format!("lb-{}", id),
        trimmed => trimmed.to_string(),
    };
    let region = regions.first().map(String::as_str).unwrap_or("global");
    format!("{}.{}.aglb.{}", host_label, region, base_domain.trim_matches('.'))
}

/// Derive the hostname and make sure the result is a usable DNS name
fn checked_hostname(
    issues: &mut IssueCollector,
    id: LoadbalancerId,
    label: &str,
    regions: &[String],
    base_domain: &str,
) -> Option<String> {
    let hostname = derive_hostname(id, label, regions, base_domain);
    if is_valid_domain_format(&hostname) {
        Some(hostname)
    } else {
        issues.push(
            ErrorKind::Format,
            Some("hostname"),
            format!("derived hostname '{}' is not a valid DNS name", hostname),
        );
        None
    }
}

fn resolve_configurations(
    issues: &mut IssueCollector,
    cx: &mut ValidationContext<'_>,
    source: ConfigurationSource<'_>,
) -> Option<Vec<ConfigurationRef>> {
    match source {
        ConfigurationSource::Inline(payloads) => issues.in_field("configurations", |c| {
            let before = c.issue_count();
            let mut refs = Vec::with_capacity(payloads.len());
            for (index, payload) in payloads.iter().enumerate() {
                if let Some(configuration) =
                    c.in_index(index, |c| aggregate_configuration(c, cx, payload))
                {
                    refs.push(ConfigurationRef { id: configuration.id, label: configuration.label });
                }
            }
            check_unique_configuration_labels(
                c,
                payloads.iter().enumerate().map(|(i, p)| (i, p.label.trim())),
                Some("label"),
            );
            (c.issue_count() == before).then_some(refs)
        }),
        ConfigurationSource::ByReference(ids) => issues.in_field("configuration_ids", |c| {
            let before = c.issue_count();
            let mut refs = Vec::with_capacity(ids.len());
            let mut labels = Vec::with_capacity(ids.len());
            for (index, raw) in ids.iter().enumerate() {
                let id = ConfigurationId::new(*raw);
                match cx.snapshot().configurations.get(&id) {
                    Some(configuration) => {
                        cx.references_mut().add_configuration(id);
                        labels.push((index, configuration.label.as_str()));
                        refs.push(ConfigurationRef { id, label: configuration.label.clone() });
                    }
                    None => c.in_index(index, |c| {
                        c.push(
                            ErrorKind::ReferenceNotFound,
                            None,
                            format!("configuration {} does not exist", id),
                        )
                    }),
                }
            }
            check_unique_configuration_labels(c, labels, None);
            (c.issue_count() == before).then_some(refs)
        }),
    }
}

fn check_unique_configuration_labels<'l>(
    issues: &mut IssueCollector,
    labels: impl IntoIterator<Item = (usize, &'l str)>,
    leaf: Option<&str>,
) {
    let mut seen = HashSet::new();
    for (index, label) in labels {
        if !seen.insert(label) {
            issues.in_index(index, |c| {
                c.push(
                    ErrorKind::DuplicateConfigurationLabel,
                    leaf,
                    format!("configuration label '{}' is already used in this loadbalancer", label),
                )
            });
        }
    }
}

/// Validate a create payload into a commit graph.
///
/// Inline configurations, their routes and targets are all part of the
/// graph. The loadbalancer gets a fresh id and version 1.
pub fn validate_create_loadbalancer(
    mut cx: ValidationContext<'_>,
    payload: &CreateLoadbalancerPayload,
) -> Result<ResourceGraph, ValidationReport> {
    let mut issues = IssueCollector::new();

    let label = issues.check("label", validate_label(&payload.label));
    let regions = normalize_regions(&mut issues, &payload.regions);
    let tags = normalize_tags(&mut issues, payload.tags.as_deref());
    let configurations = resolve_configurations(
        &mut issues,
        &mut cx,
        ConfigurationSource::Inline(payload.configurations.as_deref().unwrap_or_default()),
    );

    let (Some(label), Some(regions), Some(tags), Some(configurations)) =
        (label, regions, tags, configurations)
    else {
        return Err(issues.into_report());
    };
    if !issues.is_clean() {
        return Err(issues.into_report());
    }

    let id = cx.next_id::<LoadbalancerId>();
    let Some(hostname) = checked_hostname(&mut issues, id, &label, &regions, cx.base_domain()) else {
        return Err(issues.into_report());
    };
    let loadbalancer = Loadbalancer {
        id,
        hostname,
        label,
        regions,
        tags,
        configurations,
        version: 1,
    };
    Ok(cx.into_graph(CommittedId::Loadbalancer(loadbalancer.id), Some(loadbalancer), None))
}

/// Validate a full replacement of the snapshot's loadbalancer.
///
/// The result supersedes the current version; the commit fails with a
/// conflict if someone else committed in between.
pub fn validate_update_loadbalancer(
    mut cx: ValidationContext<'_>,
    payload: &UpdateLoadbalancerPayload,
) -> Result<ResourceGraph, ValidationReport> {
    let mut issues = IssueCollector::new();

    let Some(current) = cx.snapshot().loadbalancer.as_ref() else {
        issues.push(ErrorKind::ReferenceNotFound, Some("id"), "loadbalancer does not exist");
        return Err(issues.into_report());
    };

    let label = issues.check("label", validate_label(&payload.label));
    let regions = normalize_regions(&mut issues, &payload.regions);
    let tags = normalize_tags(&mut issues, payload.tags.as_deref());
    let configurations = resolve_configurations(
        &mut issues,
        &mut cx,
        ConfigurationSource::ByReference(payload.configuration_ids.as_deref().unwrap_or_default()),
    );
    // An update replaces the whole set; omitting it must not detach everything
    if payload.configuration_ids.is_none() {
        issues.push(
            ErrorKind::Required,
            Some("configuration_ids"),
            "configuration_ids is required; send [] to detach every configuration",
        );
    }

    let (Some(label), Some(regions), Some(tags), Some(configurations)) =
        (label, regions, tags, configurations)
    else {
        return Err(issues.into_report());
    };
    if !issues.is_clean() {
        return Err(issues.into_report());
    }

    let supersedes = Supersedes { id: current.id, version: current.version };
    let Some(hostname) =
        checked_hostname(&mut issues, current.id, &label, &regions, cx.base_domain())
    else {
        return Err(issues.into_report());
    };
    let loadbalancer = Loadbalancer {
        id: current.id,
        hostname,
        label,
        regions,
        tags,
        configurations,
        version: current.version + 1,
    };
    Ok(cx.into_graph(CommittedId::Loadbalancer(loadbalancer.id), Some(loadbalancer), Some(supersedes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Configuration, IdSequence, Port, Protocol};
    use crate::validation::context::Snapshot;

    fn create(value: serde_json::Value) -> Result<ResourceGraph, ValidationReport> {
        let payload: CreateLoadbalancerPayload = serde_json::from_value(value).expect("payload parses");
        let snapshot = Snapshot::new();
        let ids = IdSequence::starting_at(1);
        validate_create_loadbalancer(ValidationContext::new(&snapshot, &ids, "example.net"), &payload)
    }

    fn tcp_configuration(label: &str) -> serde_json::Value {
        serde_json::json!({"label": label, "port": 5432, "protocol": "TCP"})
    }

    #[test]
    fn normalizes_regions_and_tags() {
        let graph = create(serde_json::json!({
            "label": "Main_LB",
            "regions": ["US-East", "eu-west", "us-east"],
            "tags": ["prod", "db", "prod"],
            "configurations": [tcp_configuration("pg")]
        }))
        .expect("valid");

        let lb = graph.loadbalancer.expect("loadbalancer in graph");
        assert_eq!(lb.regions, vec!["eu-west", "us-east"]);
        assert_eq!(lb.tags, vec!["db", "prod"]);
        assert_eq!(lb.hostname, "main-lb.eu-west.aglb.example.net");
        assert_eq!(lb.version, 1);
        assert_eq!(graph.root, CommittedId::Loadbalancer(lb.id));
        assert_eq!(lb.configurations[0].id, graph.configurations[0].id);
    }

    #[test]
    fn regions_are_required() {
        let report = create(serde_json::json!({"label": "lb", "regions": []})).unwrap_err();
        assert_eq!(report.kinds(), vec![ErrorKind::Required]);
        assert_eq!(report.issues[0].field, "regions");
    }

    #[test]
    fn duplicate_configuration_labels() {
        let report = create(serde_json::json!({
            "label": "lb",
            "regions": ["us-east"],
            "configurations": [tcp_configuration("pg"), tcp_configuration("pg")]
        }))
        .unwrap_err();
        assert_eq!(report.kinds(), vec![ErrorKind::DuplicateConfigurationLabel]);
        assert_eq!(report.issues[0].field, "configurations[1].label");
    }

    #[test]
    fn errors_from_every_level_are_collected() {
        let report = create(serde_json::json!({
            "label": "",
            "regions": ["us east"],
            "configurations": [
                {"label": "a", "port": 70000, "protocol": "TCP"},
                {"label": "b", "port": 80, "protocol": "HTTP", "routes": [], "route_ids": []}
            ]
        }))
        .unwrap_err();
        assert_eq!(
            report.kinds(),
            vec![
                ErrorKind::Required,
                ErrorKind::Format,
                ErrorKind::Range,
                ErrorKind::AmbiguousRouteSource
            ]
        );
        assert_eq!(report.issues[2].field, "configurations[0].port");
    }

    #[test]
    fn update_supersedes_current_version() {
        let current = Loadbalancer {
            id: LoadbalancerId::new(1),
            label: "lb".into(),
            regions: vec!["us-east".into()],
            hostname: "lb.us-east.aglb.example.net".into(),
            tags: vec![],
            configurations: vec![],
            version: 3,
        };
        let snapshot = Snapshot::new().with_loadbalancer(current).with_configuration(Configuration {
            id: ConfigurationId::new(5),
            label: "pg".into(),
            port: Port::new_unchecked(5432),
            protocol: Protocol::Tcp,
            certificate_table: vec![],
            routes: vec![],
        });
        let ids = IdSequence::starting_at(100);
        let payload = UpdateLoadbalancerPayload {
            label: "lb-renamed".into(),
            regions: vec!["ap-south".into()],
            tags: None,
            configuration_ids: Some(vec![5]),
        };

        let graph = validate_update_loadbalancer(
            ValidationContext::new(&snapshot, &ids, "example.net"),
            &payload,
        )
        .expect("valid");

        let lb = graph.loadbalancer.expect("loadbalancer in graph");
        assert_eq!(lb.id, LoadbalancerId::new(1));
        assert_eq!(lb.version, 4);
        assert_eq!(lb.hostname, "lb-renamed.ap-south.aglb.example.net");
        assert_eq!(graph.supersedes, Some(Supersedes { id: LoadbalancerId::new(1), version: 3 }));
        assert_eq!(graph.references.configurations, vec![ConfigurationId::new(5)]);
        assert!(graph.configurations.is_empty());
    }

    #[test]
    fn update_reports_dangling_configuration_ids() {
        let snapshot = Snapshot::new().with_loadbalancer(Loadbalancer {
            id: LoadbalancerId::new(1),
            label: "lb".into(),
            regions: vec!["us-east".into()],
            hostname: String::new(),
            tags: vec![],
            configurations: vec![],
            version: 1,
        });
        let ids = IdSequence::default();
        let payload = UpdateLoadbalancerPayload {
            label: "lb".into(),
            regions: vec!["us-east".into()],
            tags: None,
            configuration_ids: Some(vec![42]),
        };
        let report = validate_update_loadbalancer(
            ValidationContext::new(&snapshot, &ids, "example.net"),
            &payload,
        )
        .unwrap_err();
        assert_eq!(report.kinds(), vec![ErrorKind::ReferenceNotFound]);
        assert_eq!(report.issues[0].field, "configuration_ids[0]");
    }

    fn update(payload: UpdateLoadbalancerPayload) -> Result<ResourceGraph, ValidationReport> {
        let snapshot = Snapshot::new().with_loadbalancer(Loadbalancer {
            id: LoadbalancerId::new(1),
            label: "lb".into(),
            regions: vec!["us-east".into()],
            hostname: "lb.us-east.aglb.example.net".into(),
            tags: vec![],
            configurations: vec![],
            version: 1,
        });
        let ids = IdSequence::starting_at(10);
        validate_update_loadbalancer(ValidationContext::new(&snapshot, &ids, "example.net"), &payload)
    }

    #[test]
    fn hostname_falls_back_to_id_for_symbol_only_labels() {
        let graph = create(serde_json::json!({"label": "___", "regions": ["us-east"]})).expect("valid");
        let lb = graph.loadbalancer.expect("loadbalancer in graph");
        assert_eq!(lb.hostname, format!("lb-{}.us-east.aglb.example.net", lb.id));
        assert!(is_valid_domain_format(&lb.hostname));

        assert_eq!(
            derive_hostname(LoadbalancerId::new(7), "-_-", &["eu-west".into()], "example.net"),
            "lb-7.eu-west.aglb.example.net"
        );
    }

    #[test]
    fn long_labels_are_cut_to_one_dns_label() {
        let label = format!("{}_{}", "a".repeat(62), "b".repeat(1));
        let hostname = derive_hostname(LoadbalancerId::new(1), &label, &["us-east".into()], "example.net");
        assert_eq!(hostname, format!("{}.us-east.aglb.example.net", "a".repeat(62)));
        assert!(is_valid_domain_format(&hostname));

        let graph = create(serde_json::json!({"label": "x".repeat(64), "regions": ["us-east"]}))
            .expect("valid");
        let lb = graph.loadbalancer.expect("loadbalancer in graph");
        assert!(lb.hostname.starts_with(&format!("{}.", "x".repeat(63))));
    }

    #[test]
    fn invalid_base_domain_is_reported_on_hostname() {
        let payload: CreateLoadbalancerPayload =
            serde_json::from_value(serde_json::json!({"label": "lb", "regions": ["us-east"]}))
                .expect("payload parses");
        let snapshot = Snapshot::new();
        let ids = IdSequence::starting_at(1);
        let report = validate_create_loadbalancer(
            ValidationContext::new(&snapshot, &ids, "bad domain"),
            &payload,
        )
        .unwrap_err();
        assert_eq!(report.kinds(), vec![ErrorKind::Format]);
        assert_eq!(report.issues[0].field, "hostname");
    }

    #[test]
    fn update_requires_configuration_ids() {
        let report = update(UpdateLoadbalancerPayload {
            label: "lb".into(),
            regions: vec!["us-east".into()],
            tags: None,
            configuration_ids: None,
        })
        .unwrap_err();
        assert_eq!(report.kinds(), vec![ErrorKind::Required]);
        assert_eq!(report.issues[0].field, "configuration_ids");
    }

    #[test]
    fn empty_configuration_ids_detach_everything() {
        let graph = update(UpdateLoadbalancerPayload {
            label: "lb".into(),
            regions: vec!["us-east".into()],
            tags: None,
            configuration_ids: Some(vec![]),
        })
        .expect("valid");
        let lb = graph.loadbalancer.expect("loadbalancer in graph");
        assert!(lb.configurations.is_empty());
        assert_eq!(lb.version, 2);
    }
}
