//! Domain layer
//!
//! Canonical, validated entities of the load balancer configuration model.
//! Values of these types only come out of the validation layer or the
//! store, so downstream code can rely on their invariants (ports in range,
//! closed enums, percentages summing to 100 per rule).
//!
//! ## Module Organization
//!
//! - `id`: Type-safe domain identifiers with NewType pattern
//! - `loadbalancer`: Loadbalancer and the nested graph written on commit
//! - `configuration`: Listener port/protocol and certificate table
//! - `route`: Routes, rules and match conditions
//! - `service_target`: Backend pools, endpoints and health checks
//! - `certificate`: TLS certificate resources

pub mod certificate;
pub mod configuration;
pub mod id;
pub mod loadbalancer;
pub mod route;
pub mod service_target;

pub use certificate::{Certificate, CertificateType, NewCertificate};
pub use configuration::{CertificateBinding, Configuration, Port, Protocol, RouteRef};
pub use id::{
    CertificateId, ConfigurationId, IdSequence, LoadbalancerId, RouteId, ServiceTargetId,
};
pub use loadbalancer::{
    CommittedId, ConfigurationRef, Loadbalancer, References, ResourceGraph, Supersedes,
};
pub use route::{AffinityTtl, MatchCondition, MatchField, Percentage, Rule, RuleTarget, Route};
pub use service_target::{
    Endpoint, EndpointAddress, HealthCheck, LoadBalancingPolicy, ServiceTarget,
};
