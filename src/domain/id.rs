//! Domain ID Types with NewType Pattern
//!
//! Type-safe wrappers for the numeric identifiers used on the wire, so a
//! route id can never be passed where a certificate id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Macro to generate NewType ID wrappers with all required traits
macro_rules! domain_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw id (for database retrieval and payload references)
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Get the inner value
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

domain_id!(
    /// Unique identifier for a loadbalancer
    LoadbalancerId
);

domain_id!(
    /// Unique identifier for a configuration (listener)
    ConfigurationId
);

domain_id!(
    /// Unique identifier for a route
    RouteId
);

domain_id!(
    /// Unique identifier for a service target
    ServiceTargetId
);

domain_id!(
    /// Unique identifier for a certificate
    CertificateId
);

/// Hands out synthetic ids for entities created inline.
///
/// One sequence is shared by every entity kind, so ids are unique across the
/// whole store. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct IdSequence {
    next: Arc<AtomicI64>,
}

impl IdSequence {
    /// Start a sequence whose first id is `first`
    pub fn starting_at(first: i64) -> Self {
        Self { next: Arc::new(AtomicI64::new(first.max(1))) }
    }

    /// Start a sequence after the highest id already in use
    pub fn after(highest_in_use: i64) -> Self {
        Self::starting_at(highest_in_use.saturating_add(1))
    }

    pub fn next_raw(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    pub fn next_id<T: From<i64>>(&self) -> T {
        T::from(self.next_raw())
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Serde adapter for ids that travel as strings on the wire
/// (`certificate_table[].certificate_id`, `ca_certificate`).
pub mod id_as_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(id: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<T>().map_err(de::Error::custom)
    }
}
