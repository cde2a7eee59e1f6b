use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use inforest_types::{Memo, MemoSeed, TreeId, UserId};
use tracing::debug;

use crate::error::{MemoError, MemoResult};
use crate::traits::MemoStore;

type MemoKey = (UserId, TreeId);

/// In-memory, HashMap-based memo store.
///
/// Intended for tests and embedding. Memos are cloned on read and write.
#[derive(Default)]
pub struct InMemoryMemoStore {
    memos: RwLock<HashMap<MemoKey, Memo>>,
}

impl InMemoryMemoStore {
    /// Create a new empty memo store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memos currently stored.
    pub fn len(&self) -> usize {
        self.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tree ids holding a memo for `user`, sorted.
    pub fn tree_ids_for(&self, user: &UserId) -> Vec<TreeId> {
        let mut ids: Vec<TreeId> = self
            .read()
            .map(|m| {
                m.keys()
                    .filter(|(u, _)| u == user)
                    .map(|(_, t)| t.clone())
                    .collect()
            })
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn read(&self) -> MemoResult<RwLockReadGuard<'_, HashMap<MemoKey, Memo>>> {
        self.memos
            .read()
            .map_err(|e| MemoError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> MemoResult<RwLockWriteGuard<'_, HashMap<MemoKey, Memo>>> {
        self.memos
            .write()
            .map_err(|e| MemoError::Unavailable(format!("lock poisoned: {e}")))
    }
}

fn not_found(user: &UserId, tree: &TreeId) -> MemoError {
    MemoError::NotFound {
        user: user.clone(),
        tree: tree.clone(),
    }
}

#[async_trait]
impl MemoStore for InMemoryMemoStore {
    async fn create_memo(&self, user: &UserId, tree: &TreeId, seed: MemoSeed) -> MemoResult<Memo> {
        let mut memos = self.write()?;
        let key = (user.clone(), tree.clone());
        if memos.contains_key(&key) {
            return Err(MemoError::AlreadyExists {
                user: user.clone(),
                tree: tree.clone(),
            });
        }
        let memo = seed.into_memo(user.clone(), tree.clone());
        memos.insert(key, memo.clone());
        debug!(user_id = %user, tree_id = %tree, version = memo.version, "memo created");
        Ok(memo)
    }

    async fn get_memo(&self, user: &UserId, tree: &TreeId) -> MemoResult<Memo> {
        self.read()?
            .get(&(user.clone(), tree.clone()))
            .cloned()
            .ok_or_else(|| not_found(user, tree))
    }

    async fn update_memo(&self, user: &UserId, tree: &TreeId, content: String) -> MemoResult<Memo> {
        let mut memos = self.write()?;
        let memo = memos
            .get_mut(&(user.clone(), tree.clone()))
            .ok_or_else(|| not_found(user, tree))?;
        memo.content = Some(content);
        memo.version += 1;
        Ok(memo.clone())
    }

    async fn delete_memo(&self, user: &UserId, tree: &TreeId) -> MemoResult<Memo> {
        let memo = self
            .write()?
            .remove(&(user.clone(), tree.clone()))
            .ok_or_else(|| not_found(user, tree))?;
        debug!(user_id = %user, tree_id = %tree, "memo deleted");
        Ok(memo)
    }
}

impl std::fmt::Debug for InMemoryMemoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMemoStore")
            .field("memo_count", &self.len())
            .finish()
    }
}
