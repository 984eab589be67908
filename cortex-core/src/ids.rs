//! Typed identifier wrappers for the data model (spec §3).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Typed ID wrappers prevent mixing up project, session, task, and chunk
/// identifiers. Plain strings underneath — no format is enforced beyond
/// what each constructor produces.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing string as this id type.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(ProjectId, "Stable identifier for a project workspace.");
typed_id!(SessionId, "Identifier for one continuous user interaction.");
typed_id!(TaskId, "Identifier for a task within a plan.");
typed_id!(ChunkId, "Identifier for a retrievable chunk of source text.");

impl ProjectId {
    /// Derive a project id from an absolute root path: the first 16 hex
    /// characters of the SHA-256 hash of the path, per spec §4.9 step 1.
    pub fn from_root_path(root_path: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(root_path.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex[..16].to_string())
    }
}
