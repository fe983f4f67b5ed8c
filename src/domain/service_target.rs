//! Service target domain types
//!
//! A service target is a backend pool: its endpoints, the policy used to
//! spread requests over them, the active health check and the CA used to
//! verify upstream TLS.

use std::fmt;
use std::net::IpAddr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::configuration::Port;
use super::id::{CertificateId, ServiceTargetId};

/// Load balancing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingPolicy {
    RoundRobin,
    LeastRequest,
    RingHash,
    Random,
    Maglev,
}

impl LoadBalancingPolicy {
    pub const ALL: [LoadBalancingPolicy; 5] = [
        LoadBalancingPolicy::RoundRobin,
        LoadBalancingPolicy::LeastRequest,
        LoadBalancingPolicy::RingHash,
        LoadBalancingPolicy::Random,
        LoadBalancingPolicy::Maglev,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancingPolicy::RoundRobin => "round_robin",
            LoadBalancingPolicy::LeastRequest => "least_request",
            LoadBalancingPolicy::RingHash => "ring_hash",
            LoadBalancingPolicy::Random => "random",
            LoadBalancingPolicy::Maglev => "maglev",
        }
    }

    /// Consistent-hashing policies keep a client on the same endpoint
    pub fn is_consistent_hash(&self) -> bool {
        matches!(self, LoadBalancingPolicy::RingHash | LoadBalancingPolicy::Maglev)
    }
}

impl fmt::Display for LoadBalancingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint address (IP or hostname); exactly one on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointAddress {
    Ip(IpAddr),
    Host(String),
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointAddress::Ip(ip) => write!(f, "{}", ip),
            EndpointAddress::Host(host) => f.write_str(host),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(flatten)]
    pub address: EndpointAddress,
    pub port: Port,
    pub rate_capacity: u64,
}

impl Endpoint {
    /// Get endpoint as "host:port" string
    pub fn to_socket_string(&self) -> String {
        match &self.address {
            EndpointAddress::Ip(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            other => format!("{}:{}", other, self.port),
        }
    }
}

/// Active health check; interval and timeout in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub interval: u64,
    pub timeout: u64,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
    pub path: String,
    pub host: String,
}

/// Validated service target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub id: ServiceTargetId,
    pub label: String,
    pub endpoints: Vec<Endpoint>,
    /// Empty string on the wire when upstream TLS is not verified
    #[serde(with = "optional_certificate")]
    pub ca_certificate: Option<CertificateId>,
    pub load_balancing_policy: LoadBalancingPolicy,
    pub healthcheck: HealthCheck,
}

mod optional_certificate {
    use super::*;

    pub fn serialize<S: Serializer>(
        id: &Option<CertificateId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<CertificateId>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        raw.parse::<CertificateId>().map(Some).map_err(de::Error::custom)
    }
}
