use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCertificatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub certificate: String,
    pub label: String,
    #[serde(rename = "type")]
    pub certificate_type: String,
}
