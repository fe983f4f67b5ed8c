use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePayload {
    pub label: String,
    #[serde(default)]
    pub rules: Vec<RulePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePayload {
    pub match_condition: MatchConditionPayload,
    #[serde(default)]
    pub service_targets: Vec<ServiceTargetPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConditionPayload {
    #[serde(default)]
    pub hostname: String,
    pub match_field: String,
    #[serde(default)]
    pub match_value: String,
    #[serde(default)]
    pub affinity_cookie: Option<String>,
    #[serde(default)]
    pub affinity_ttl: Option<String>,
}

/// Service target as written inside a rule.
///
/// With `id` set the payload reuses that committed target and must match it
/// exactly; without it a new target is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTargetPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub label: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointPayload>,
    #[serde(default)]
    pub ca_certificate: String,
    pub load_balancing_policy: String,
    pub healthcheck: HealthCheckPayload,
    #[serde(
        default,
        alias = "service_target_percentage",
        skip_serializing_if = "Option::is_none"
    )]
    pub percentage: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub port: i64,
    #[serde(default)]
    pub rate_capacity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckPayload {
    pub interval: i64,
    pub timeout: i64,
    pub unhealthy_threshold: i64,
    pub healthy_threshold: i64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub host: String,
}
