//! Certificate domain types
//!
//! Certificates are independent resources. Configurations reference
//! `downstream` certificates through their certificate table; service
//! targets reference `ca` certificates to verify upstream TLS.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::CertificateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateType {
    /// Trust anchor for upstream (service target) TLS
    Ca,
    /// Served to clients on HTTPS listeners
    Downstream,
}

impl CertificateType {
    pub const ALL: [CertificateType; 2] = [CertificateType::Ca, CertificateType::Downstream];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Ca => "ca",
            CertificateType::Downstream => "downstream",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate as exposed by the API; PEM material is never echoed back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub label: String,
    #[serde(rename = "type")]
    pub certificate_type: CertificateType,
}

/// Validated certificate creation, including the PEM material to store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub id: CertificateId,
    pub label: String,
    pub certificate_type: CertificateType,
    pub certificate: String,
    pub key: Option<String>,
}

impl NewCertificate {
    pub fn summary(&self) -> Certificate {
        Certificate {
            id: self.id,
            label: self.label.clone(),
            certificate_type: self.certificate_type,
        }
    }
}
