//! Route domain types
//!
//! A route is a labelled list of rules; each rule pairs one match condition
//! with a weighted set of service targets.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::id::{RouteId, ServiceTargetId};

/// Request attribute a rule matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    PathPrefix,
    Query,
    Host,
    Header,
    Method,
}

impl MatchField {
    pub const ALL: [MatchField; 5] = [
        MatchField::PathPrefix,
        MatchField::Query,
        MatchField::Host,
        MatchField::Header,
        MatchField::Method,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchField::PathPrefix => "path_prefix",
            MatchField::Query => "query",
            MatchField::Host => "host",
            MatchField::Header => "header",
            MatchField::Method => "method",
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session affinity lifetime, canonically whole seconds.
///
/// Travels as a duration string (`"3600s"`) to match the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AffinityTtl(u64);

impl AffinityTtl {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AffinityTtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl Serialize for AffinityTtl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AffinityTtl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        crate::validation::parse_duration_secs(&raw)
            .map(AffinityTtl)
            .map_err(|e| de::Error::custom(e.message))
    }
}

/// Canonical match condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCondition {
    pub hostname: String,
    pub match_field: MatchField,
    pub match_value: String,
    /// Present together with `affinity_ttl` or not at all
    pub affinity_cookie: Option<String>,
    pub affinity_ttl: Option<AffinityTtl>,
}

impl MatchCondition {
    pub fn has_affinity(&self) -> bool {
        self.affinity_cookie.is_some()
    }
}

/// Share of a rule's traffic, `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    pub(crate) const fn new_unchecked(value: u8) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Service target reference within a rule, with its resolved share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTarget {
    pub id: ServiceTargetId,
    pub label: String,
    pub percentage: Percentage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub match_condition: MatchCondition,
    pub service_targets: Vec<RuleTarget>,
}

impl Rule {
    /// Sum of resolved percentages; 100 for every validated rule
    pub fn percentage_total(&self) -> u32 {
        self.service_targets.iter().map(|t| u32::from(t.percentage.get())).sum()
    }
}

/// Validated route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub label: String,
    pub rules: Vec<Rule>,
}

impl Route {
    pub fn service_target_ids(&self) -> impl Iterator<Item = ServiceTargetId> + '_ {
        self.rules.iter().flat_map(|rule| rule.service_targets.iter().map(|t| t.id))
    }
}
