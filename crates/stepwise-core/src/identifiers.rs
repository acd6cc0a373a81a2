//! Typed row identifiers.
//!
//! Every persisted entity is keyed by an integer primary key. Each entity gets
//! its own newtype so an `AgentId` can never be passed where an `ExecutionId`
//! is expected, while still serializing as a bare integer on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw primary key.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw primary key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
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

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

row_id! {
    /// Identifier of a persisted agent definition.
    AgentId
}

row_id! {
    /// Identifier of one run instance of an agent.
    ExecutionId
}

row_id! {
    /// Identifier of a registered tool descriptor.
    ToolId
}

row_id! {
    /// Identifier of the project owning an agent.
    ProjectId
}
