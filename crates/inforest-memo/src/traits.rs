use async_trait::async_trait;
use inforest_types::{Memo, MemoSeed, TreeId, UserId};

use crate::error::MemoResult;

/// Per-(user, tree) memo storage.
///
/// Every call is an independent remote operation. Implementations must be
/// thread-safe; nothing else is assumed.
#[async_trait]
pub trait MemoStore: Send + Sync {
    /// Create the memo for `(user, tree)` from `seed`.
    ///
    /// The seed's content and version are stored verbatim, which lets
    /// callers recreate a previously deleted memo exactly.
    /// Fails with `AlreadyExists` if the pair already has a memo.
    async fn create_memo(&self, user: &UserId, tree: &TreeId, seed: MemoSeed) -> MemoResult<Memo>;

    /// Fails with `NotFound` if the pair has no memo.
    async fn get_memo(&self, user: &UserId, tree: &TreeId) -> MemoResult<Memo>;

    /// Replace the content and bump the version by one.
    async fn update_memo(&self, user: &UserId, tree: &TreeId, content: String) -> MemoResult<Memo>;

    /// Delete the memo and return its state just before deletion.
    async fn delete_memo(&self, user: &UserId, tree: &TreeId) -> MemoResult<Memo>;
}
