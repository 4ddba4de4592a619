//! Opaque identifiers shared across the orchestration core.

use std::sync::Arc;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        /// Cheaply cloneable opaque identifier.
        #[derive(Clone, Debug, Hash, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new() -> Self {
                Self(Arc::from(Uuid::new_v4().to_string()))
            }

            pub fn from_str(s: impl Into<String>) -> Self {
                Self(Arc::from(s.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_str(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_str(s)
            }
        }
    };
}

opaque_id!(TaskId);
opaque_id!(AgentId);
opaque_id!(ActionId);
