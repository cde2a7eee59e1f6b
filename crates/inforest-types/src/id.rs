use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw identifier. Empty strings are rejected.
            pub fn new(raw: impl Into<String>) -> Result<Self, TypeError> {
                let raw = raw.into();
                if raw.is_empty() {
                    return Err(TypeError::EmptyId { kind: $kind });
                }
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = TypeError;

            fn try_from(raw: &str) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Authenticated owner of forests and memos.
    UserId,
    "user"
);

string_id!(
    /// Identifier of a forest record. Assigned by the hierarchy store.
    ForestId,
    "forest"
);

string_id!(
    /// Identifier of a tree node. Chosen by the client and unique across
    /// the whole hierarchy store, not only within one forest.
    TreeId,
    "tree"
);

impl ForestId {
    /// Fresh time-ordered forest id (UUID v7).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}
