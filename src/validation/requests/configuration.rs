use serde::{Deserialize, Serialize};

use super::route::RoutePayload;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateTableEntry {
    pub sni_hostname: String,
    pub certificate_id: String,
}

/// Configuration payload. `routes` creates routes inline, `route_ids`
/// attaches existing ones; at most one may be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationPayload {
    pub label: String,
    pub port: i64,
    pub protocol: String,
    #[serde(default)]
    pub certificate_table: Vec<CertificateTableEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RoutePayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_ids: Option<Vec<i64>>,
}
