use serde::{Deserialize, Serialize};

use super::configuration::ConfigurationPayload;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLoadbalancerPayload {
    pub label: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configurations: Option<Vec<ConfigurationPayload>>,
}

/// Full replacement of a loadbalancer; `configuration_ids` is the complete
/// new set of attached configurations. It must be present: `[]` detaches
/// everything, a missing field is reported as required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLoadbalancerPayload {
    pub label: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_ids: Option<Vec<i64>>,
}
