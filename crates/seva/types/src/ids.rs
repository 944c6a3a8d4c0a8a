//! Identifier newtypes.
//!
//! Every identifier is a thin wrapper over its wire representation so the
//! compiler keeps ARNs, task ids, and role names from being mixed up.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id! {
    /// Application Reference Number — the application's unique identifier.
    Arn
}

string_id! {
    /// Key identifying a government service (e.g. `water_connection`).
    ServiceKey
}

string_id! {
    /// The authority (district office, municipality) processing a case.
    AuthorityId
}

string_id! {
    /// An officer's user identifier.
    OfficerId
}

string_id! {
    /// A system role held by officers (e.g. `CLERK`, `ACCOUNT_OFFICER`).
    RoleId
}

string_id! {
    /// A workflow state within a definition.
    StateId
}

string_id! {
    /// A transition edge within a definition.
    TransitionId
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an officer task.
    TaskId
}

uuid_id! {
    /// Unique identifier for a query cycle.
    QueryId
}

uuid_id! {
    /// Unique identifier for a decision record.
    DecisionId
}
