use inforest_types::{TreeId, UserId};

/// Errors from memo store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoError {
    /// No memo exists for the pair.
    #[error("memo not found for user {user} on tree {tree}")]
    NotFound { user: UserId, tree: TreeId },

    /// A memo already exists for the pair.
    #[error("memo already exists for user {user} on tree {tree}")]
    AlreadyExists { user: UserId, tree: TreeId },

    /// The backend could not be reached or failed internally.
    #[error("memo store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for memo store operations.
pub type MemoResult<T> = Result<T, MemoError>;
