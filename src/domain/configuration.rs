//! Configuration (listener) domain types
//!
//! A configuration binds a port and protocol on the loadbalancer, carries the
//! downstream certificate table and points at the routes that serve traffic.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{id_as_string, CertificateId, ConfigurationId, RouteId};

/// Listener protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Tcp, Protocol::Http, Protocol::Https];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
        }
    }

    /// Only HTTPS listeners terminate TLS and therefore carry certificates
    pub fn terminates_tls(&self) -> bool {
        matches!(self, Protocol::Https)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TCP port in `1..=65535`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Construct without range checking; callers go through `validate_port`
    pub(crate) const fn new_unchecked(port: u16) -> Self {
        Self(port)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SNI hostname to certificate binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBinding {
    pub sni_hostname: String,
    #[serde(with = "id_as_string")]
    pub certificate_id: CertificateId,
}

/// Route attached to a configuration, by id with its label for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRef {
    pub id: RouteId,
    pub label: String,
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: ConfigurationId,
    pub label: String,
    pub port: Port,
    pub protocol: Protocol,
    pub certificate_table: Vec<CertificateBinding>,
    pub routes: Vec<RouteRef>,
}

impl Configuration {
    pub fn route_ids(&self) -> impl Iterator<Item = RouteId> + '_ {
        self.routes.iter().map(|route| route.id)
    }

    pub fn certificate_ids(&self) -> impl Iterator<Item = CertificateId> + '_ {
        self.certificate_table.iter().map(|binding| binding.certificate_id)
    }
}
