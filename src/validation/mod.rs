//! # Validation Module
//!
//! Turns wire payloads into canonical domain entities. Validation is a set of
//! pure functions, one layer per entity:
//! 1. Primitive validators for scalar fields
//! 2. Match condition resolver
//! 3. Service target assembler
//! 4. Route composer (percentage resolution, route label uniqueness)
//! 5. Configuration and loadbalancer aggregation
//!
//! Every layer records issues into an [`IssueCollector`] instead of returning
//! on the first failure, so a caller sees every problem in one response.
//! References to existing entities are resolved against a [`Snapshot`] that
//! the service layer loads before validation starts.

pub mod certificate;
pub mod configuration;
pub mod context;
pub mod conversions;
pub mod error;
pub mod loadbalancer;
pub mod match_condition;
pub mod primitives;
pub mod proposal;
pub mod requests;
pub mod route;
pub mod service_target;

pub use certificate::validate_certificate;
pub use configuration::{aggregate_configuration, validate_configuration, RouteSource};
pub use context::{RequestedIds, Snapshot, ValidationContext};
pub use conversions::{configuration_payload, loadbalancer_payload, route_payload};
pub use error::{ErrorKind, FieldError, IssueCollector, ValidationIssue, ValidationReport};
pub use loadbalancer::{
    derive_hostname, validate_create_loadbalancer, validate_update_loadbalancer,
    ConfigurationSource,
};
pub use match_condition::resolve_match_condition;
pub use primitives::*;
pub use proposal::{Proposal, ProposalPayload, ProposalState, Rejection};
pub use requests::*;
pub use route::{compose_route, equal_split, resolve_percentages, validate_standalone_route};
pub use service_target::assemble_service_target;
