//! Configuration proposals and their lifecycle.
//!
//! ```text
//! Draft ──validate──▶ Validated ──commit──▶ Committed
//!   │                     │
//!   └──────────┬──────────┘
//!              ▼
//!          Rejected
//! ```
//!
//! `Committed` and `Rejected` are terminal. A committed loadbalancer is never
//! edited in place; [`Proposal::supersede`] starts a new draft that replaces
//! it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{CommittedId, LoadbalancerId, ResourceGraph};
use crate::errors::{AglbError, Result};

use super::configuration::validate_configuration;
use super::context::ValidationContext;
use super::error::ValidationReport;
use super::loadbalancer::{validate_create_loadbalancer, validate_update_loadbalancer};
use super::requests::{
    ConfigurationPayload, CreateLoadbalancerPayload, RoutePayload, UpdateLoadbalancerPayload,
};
use super::route::validate_standalone_route;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    Draft,
    Validated,
    Committed,
    Rejected,
}

impl ProposalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalState::Draft => "draft",
            ProposalState::Validated => "validated",
            ProposalState::Committed => "committed",
            ProposalState::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalState::Committed | ProposalState::Rejected)
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a proposal asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalPayload {
    CreateLoadbalancer(CreateLoadbalancerPayload),
    UpdateLoadbalancer { id: LoadbalancerId, payload: UpdateLoadbalancerPayload },
    Configuration(ConfigurationPayload),
    Route(RoutePayload),
}

impl ProposalPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ProposalPayload::CreateLoadbalancer(_) => "create_loadbalancer",
            ProposalPayload::UpdateLoadbalancer { .. } => "update_loadbalancer",
            ProposalPayload::Configuration(_) => "configuration",
            ProposalPayload::Route(_) => "route",
        }
    }
}

/// Why a proposal ended up rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Invalid(ValidationReport),
    CommitFailed(String),
    Abandoned(String),
}

#[derive(Debug, Clone)]
pub struct Proposal {
    payload: ProposalPayload,
    state: ProposalState,
    graph: Option<ResourceGraph>,
    committed: Option<CommittedId>,
    rejection: Option<Rejection>,
}

impl Proposal {
    pub fn new(payload: ProposalPayload) -> Self {
        Self { payload, state: ProposalState::Draft, graph: None, committed: None, rejection: None }
    }

    pub fn state(&self) -> ProposalState {
        self.state
    }

    pub fn payload(&self) -> &ProposalPayload {
        &self.payload
    }

    /// Validated graph, present from `Validated` on
    pub fn graph(&self) -> Option<&ResourceGraph> {
        self.graph.as_ref()
    }

    pub fn committed_id(&self) -> Option<CommittedId> {
        self.committed
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        self.rejection.as_ref()
    }

    /// Run validation. `Draft -> Validated` on success, `Draft -> Rejected`
    /// with the full report otherwise.
    pub fn validate(&mut self, cx: ValidationContext<'_>) -> Result<&ResourceGraph> {
        self.expect_state(ProposalState::Draft, "validate")?;

        let outcome = match &self.payload {
            ProposalPayload::CreateLoadbalancer(payload) => validate_create_loadbalancer(cx, payload),
            ProposalPayload::UpdateLoadbalancer { payload, .. } => {
                validate_update_loadbalancer(cx, payload)
            }
            ProposalPayload::Configuration(payload) => validate_configuration(cx, payload),
            ProposalPayload::Route(payload) => validate_standalone_route(cx, payload),
        };

        match outcome {
            Ok(graph) => {
                self.state = ProposalState::Validated;
                Ok(self.graph.insert(graph))
            }
            Err(report) => {
                self.state = ProposalState::Rejected;
                self.rejection = Some(Rejection::Invalid(report.clone()));
                Err(AglbError::Validation(report))
            }
        }
    }

    /// Graph to hand to the store; only a validated proposal can be committed
    pub fn graph_for_commit(&self) -> Result<&ResourceGraph> {
        self.expect_state(ProposalState::Validated, "commit")?;
        self.graph
            .as_ref()
            .ok_or_else(|| AglbError::internal("validated proposal has no graph"))
    }

    /// Record the store's answer. `Validated -> Committed` on success,
    /// `Validated -> Rejected` otherwise; the store error is passed through.
    pub fn finish_commit(&mut self, outcome: Result<CommittedId>) -> Result<CommittedId> {
        self.expect_state(ProposalState::Validated, "commit")?;
        match outcome {
            Ok(id) => {
                self.state = ProposalState::Committed;
                self.committed = Some(id);
                Ok(id)
            }
            Err(err) => {
                self.state = ProposalState::Rejected;
                self.rejection = Some(Rejection::CommitFailed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Abandon a proposal before it is committed
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.transition_error("reject"));
        }
        self.state = ProposalState::Rejected;
        self.rejection = Some(Rejection::Abandoned(reason.into()));
        Ok(())
    }

    /// Start a new draft that replaces this committed loadbalancer
    pub fn supersede(&self, payload: UpdateLoadbalancerPayload) -> Result<Proposal> {
        self.expect_state(ProposalState::Committed, "supersede")?;
        match self.committed {
            Some(CommittedId::Loadbalancer(id)) => {
                Ok(Proposal::new(ProposalPayload::UpdateLoadbalancer { id, payload }))
            }
            _ => Err(AglbError::invalid_state(format!(
                "only loadbalancer proposals can be superseded, this one is a {}",
                self.payload.kind()
            ))),
        }
    }

    fn expect_state(&self, expected: ProposalState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.transition_error(action))
        }
    }

    fn transition_error(&self, action: &str) -> AglbError {
        AglbError::invalid_state(format!(
            "cannot {} a {} proposal in state {}",
            action,
            self.payload.kind(),
            self.state
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdSequence;
    use crate::validation::context::Snapshot;
    use crate::validation::ErrorKind;

    fn create_payload() -> CreateLoadbalancerPayload {
        serde_json::from_value(serde_json::json!({
            "label": "edge",
            "regions": ["us-east"],
            "configurations": [{"label": "tcp", "port": 9000, "protocol": "TCP"}]
        }))
        .expect("payload parses")
    }

    fn validated() -> Proposal {
        let snapshot = Snapshot::new();
        let ids = IdSequence::default();
        let mut proposal = Proposal::new(ProposalPayload::CreateLoadbalancer(create_payload()));
        proposal
            .validate(ValidationContext::new(&snapshot, &ids, "example.net"))
            .expect("valid");
        proposal
    }

    #[test]
    fn draft_validates_then_commits() {
        let mut proposal = validated();
        assert_eq!(proposal.state(), ProposalState::Validated);

        let root = proposal.graph_for_commit().expect("graph").root;
        let committed = proposal.finish_commit(Ok(root)).expect("committed");
        assert_eq!(proposal.state(), ProposalState::Committed);
        assert_eq!(proposal.committed_id(), Some(committed));
    }

    #[test]
    fn invalid_payload_rejects_with_report() {
        let snapshot = Snapshot::new();
        let ids = IdSequence::default();
        let mut payload = create_payload();
        payload.regions.clear();
        let mut proposal = Proposal::new(ProposalPayload::CreateLoadbalancer(payload));

        let err = proposal
            .validate(ValidationContext::new(&snapshot, &ids, "example.net"))
            .unwrap_err();
        assert!(matches!(err, AglbError::Validation(ref r) if r.contains(ErrorKind::Required)));
        assert_eq!(proposal.state(), ProposalState::Rejected);
        assert!(matches!(proposal.rejection(), Some(Rejection::Invalid(_))));
    }

    #[test]
    fn commit_failure_rejects() {
        let mut proposal = validated();
        let err = proposal
            .finish_commit(Err(AglbError::conflict("loadbalancer changed", "loadbalancer")))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(proposal.state(), ProposalState::Rejected);
    }

    #[test]
    fn committed_is_immutable() {
        let mut proposal = validated();
        let root = proposal.graph_for_commit().expect("graph").root;
        proposal.finish_commit(Ok(root)).expect("committed");

        let snapshot = Snapshot::new();
        let ids = IdSequence::default();
        assert!(matches!(
            proposal.validate(ValidationContext::new(&snapshot, &ids, "example.net")),
            Err(AglbError::InvalidState { .. })
        ));
        assert!(proposal.graph_for_commit().is_err());
        assert!(proposal.reject("too late").is_err());
        assert_eq!(proposal.state(), ProposalState::Committed);
    }

    #[test]
    fn supersede_starts_a_new_draft() {
        let mut proposal = validated();
        let root = proposal.graph_for_commit().expect("graph").root;
        proposal.finish_commit(Ok(root)).expect("committed");

        let next = proposal
            .supersede(UpdateLoadbalancerPayload {
                label: "edge".into(),
                regions: vec!["us-west".into()],
                tags: None,
                configuration_ids: None,
            })
            .expect("new draft");
        assert_eq!(next.state(), ProposalState::Draft);
        assert!(matches!(
            next.payload(),
            ProposalPayload::UpdateLoadbalancer { id, .. } if CommittedId::Loadbalancer(*id) == root
        ));
    }

    #[test]
    fn cannot_commit_a_draft() {
        let mut proposal = Proposal::new(ProposalPayload::CreateLoadbalancer(create_payload()));
        assert!(proposal.graph_for_commit().is_err());
        assert!(proposal.finish_commit(Ok(CommittedId::Loadbalancer(LoadbalancerId::new(1)))).is_err());
        assert_eq!(proposal.state(), ProposalState::Draft);
    }
}
