//! Wire payloads accepted by the service.
//!
//! Field names are the public contract and must not change. Numeric fields
//! are read as wide signed integers and enum fields as plain strings so that
//! out-of-range or unknown values reach the validators and are reported
//! alongside every other issue instead of failing deserialization.

mod certificate;
mod configuration;
mod loadbalancer;
mod route;

pub use certificate::CreateCertificatePayload;
pub use configuration::{CertificateTableEntry, ConfigurationPayload};
pub use loadbalancer::{CreateLoadbalancerPayload, UpdateLoadbalancerPayload};
pub use route::{
    EndpointPayload, HealthCheckPayload, MatchConditionPayload, RoutePayload, RulePayload,
    ServiceTargetPayload,
};
