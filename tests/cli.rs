//! `aglb validate` against payload files

mod common;

use std::io::Write;

use aglb::cli::{read_payload, validate_file, ValidateOutcome};
use aglb::validation::ErrorKind;
use aglb::AglbError;
use tempfile::Builder;

use common::*;

fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn valid_json_payload_prints_a_graph() {
    let payload = loadbalancer_json("edge", vec![http_configuration("web", 80)]);
    let file = write_temp(".json", &payload.to_string());

    let outcome = validate_file(file.path(), BASE_DOMAIN).await.unwrap();
    let ValidateOutcome::Valid(graph) = outcome else { panic!("expected a valid payload") };
    assert_eq!(graph.loadbalancer.unwrap().hostname, "edge.us-east.aglb.example.net");
}

#[tokio::test]
async fn yaml_payload_is_accepted() {
    let yaml = r#"
label: edge
regions: [us-east]
configurations:
  - label: db
    port: 5432
    protocol: TCP
    routes:
      - label: primary
        rules:
          - match_condition:
              match_field: path_prefix
              match_value: /
            service_targets:
              - label: pg
                endpoints:
                  - host: db.internal.example.com
                    port: 5432
                    rate_capacity: 50
                load_balancing_policy: least_request
                healthcheck:
                  interval: 10
                  timeout: 2
                  unhealthy_threshold: 3
                  healthy_threshold: 2
"#;
    let file = write_temp(".yaml", yaml);

    let payload = read_payload(file.path()).unwrap();
    assert_eq!(payload.label, "edge");
    assert!(validate_file(file.path(), BASE_DOMAIN).await.is_ok());
}

#[tokio::test]
async fn invalid_payload_reports_issues() {
    let payload = loadbalancer_json(
        "edge",
        vec![serde_json::json!({
            "label": "tcp",
            "port": 5432,
            "protocol": "TCP",
            "certificate_table": [{"sni_hostname": "db.example.com", "certificate_id": "7"}]
        })],
    );
    let file = write_temp(".json", &payload.to_string());

    let outcome = validate_file(file.path(), BASE_DOMAIN).await.unwrap();
    let ValidateOutcome::Invalid(report) = outcome else { panic!("expected issues") };
    assert!(report.contains(ErrorKind::UnexpectedCertificate));
}

#[tokio::test]
async fn unparseable_file_is_a_serialization_error() {
    let file = write_temp(".json", "{ not json");
    let result = validate_file(file.path(), BASE_DOMAIN).await;
    assert!(matches!(result, Err(AglbError::Serialization { .. })));
}
