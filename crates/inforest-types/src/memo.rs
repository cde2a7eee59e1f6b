use serde::{Deserialize, Serialize};

use crate::id::{TreeId, UserId};

/// Free-text content attached to a (user, tree) pair.
///
/// `version` starts at 0 and increases by exactly one on every content
/// replacement. A recreated memo carries the version it had before it was
/// deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    pub user_id: UserId,
    pub tree_id: TreeId,
    pub content: Option<String>,
    pub version: u64,
}

/// Initial state for a memo being created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoSeed {
    pub content: Option<String>,
    pub version: u64,
}

impl MemoSeed {
    /// Empty content at version 0, used for newly created trees.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Seed that recreates `memo` exactly as it was.
    pub fn restore(memo: &Memo) -> Self {
        Self {
            content: memo.content.clone(),
            version: memo.version,
        }
    }

    pub fn into_memo(self, user_id: UserId, tree_id: TreeId) -> Memo {
        Memo {
            user_id,
            tree_id,
            content: self.content,
            version: self.version,
        }
    }
}
