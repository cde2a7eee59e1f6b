//! Store wrappers that inject failures and delays for coordinator tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use inforest_hierarchy::{HierarchyError, HierarchyResult, HierarchyStore, InMemoryHierarchyStore};
use inforest_memo::{InMemoryMemoStore, MemoError, MemoResult, MemoStore};
use inforest_types::{Forest, ForestId, ForestPatch, Memo, MemoSeed, NewForest, NewTree, Tree, TreeId, TreePatch, UserId};

#[derive(Default)]
struct HierarchyFaults {
    fail_deletes: bool,
    repeat_deleted_ids: bool,
    create_delay: Option<Duration>,
    delete_delay: Option<Duration>,
    reply_delay: Option<Duration>,
    graft: Option<(NewTree, TreeId)>,
}

pub(crate) struct FaultyHierarchyStore {
    inner: InMemoryHierarchyStore,
    faults: Mutex<HierarchyFaults>,
}

impl FaultyHierarchyStore {
    pub fn new(inner: InMemoryHierarchyStore) -> Self {
        Self {
            inner,
            faults: Mutex::new(HierarchyFaults::default()),
        }
    }

    pub fn inner(&self) -> &InMemoryHierarchyStore {
        &self.inner
    }

    /// Every `delete_forest` / `delete_tree` fails with `Unavailable`.
    pub fn fail_deletes(&self) {
        self.faults.lock().unwrap().fail_deletes = true;
    }

    /// Deletes report each removed id twice.
    pub fn repeat_deleted_ids(&self) {
        self.faults.lock().unwrap().repeat_deleted_ids = true;
    }

    pub fn delay_creates(&self, delay: Duration) {
        self.faults.lock().unwrap().create_delay = Some(delay);
    }

    pub fn delay_deletes(&self, delay: Duration) {
        self.faults.lock().unwrap().delete_delay = Some(delay);
    }

    /// Creates and deletes commit immediately but answer after `delay`.
    pub fn delay_replies(&self, delay: Duration) {
        self.faults.lock().unwrap().reply_delay = Some(delay);
    }

    /// Attach `tree` under `parent` right before the next delete runs, as
    /// a concurrent create would.
    pub fn graft_before_delete(&self, tree: NewTree, parent: &TreeId) {
        self.faults.lock().unwrap().graft = Some((tree, parent.clone()));
    }

    async fn after_commit(&self) {
        let delay = self.faults.lock().unwrap().reply_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn before_create(&self) {
        let delay = self.faults.lock().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn before_delete(&self) -> HierarchyResult<bool> {
        let (delay, fail, repeat, graft) = {
            let mut faults = self.faults.lock().unwrap();
            (faults.delete_delay, faults.fail_deletes, faults.repeat_deleted_ids, faults.graft.take())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(HierarchyError::Unavailable("injected hierarchy delete failure".into()));
        }
        if let Some((tree, parent)) = graft {
            self.inner.create_tree(tree, &parent).await?;
        }
        Ok(repeat)
    }
}

fn doubled(ids: Vec<TreeId>, repeat: bool) -> Vec<TreeId> {
    if !repeat {
        return ids;
    }
    ids.iter().chain(ids.iter()).cloned().collect()
}

#[async_trait]
impl HierarchyStore for FaultyHierarchyStore {
    async fn create_forest(&self, forest: NewForest) -> HierarchyResult<Forest> {
        self.before_create().await;
        let created = self.inner.create_forest(forest).await;
        self.after_commit().await;
        created
    }

    async fn create_tree(&self, tree: NewTree, parent_id: &TreeId) -> HierarchyResult<TreeId> {
        self.before_create().await;
        let created = self.inner.create_tree(tree, parent_id).await;
        self.after_commit().await;
        created
    }

    async fn get_forest(&self, id: &ForestId, include_children: bool) -> HierarchyResult<Forest> {
        self.inner.get_forest(id, include_children).await
    }

    async fn get_tree(&self, id: &TreeId, include_children: bool) -> HierarchyResult<Tree> {
        self.inner.get_tree(id, include_children).await
    }

    async fn forest_of(&self, id: &TreeId) -> HierarchyResult<ForestId> {
        self.inner.forest_of(id).await
    }

    async fn get_forests_by_user(
        &self,
        user: &UserId,
        include_children: bool,
    ) -> HierarchyResult<Vec<Forest>> {
        self.inner.get_forests_by_user(user, include_children).await
    }

    async fn update_forest(&self, patch: &ForestPatch) -> HierarchyResult<Forest> {
        self.inner.update_forest(patch).await
    }

    async fn update_tree(&self, patch: &TreePatch) -> HierarchyResult<Tree> {
        self.inner.update_tree(patch).await
    }

    async fn delete_forest(&self, id: &ForestId) -> HierarchyResult<Vec<TreeId>> {
        let repeat = self.before_delete().await?;
        let removed = self.inner.delete_forest(id).await;
        self.after_commit().await;
        Ok(doubled(removed?, repeat))
    }

    async fn delete_tree(&self, id: &TreeId, cascade: bool) -> HierarchyResult<Vec<TreeId>> {
        let repeat = self.before_delete().await?;
        let removed = self.inner.delete_tree(id, cascade).await;
        self.after_commit().await;
        Ok(doubled(removed?, repeat))
    }
}

#[derive(Default)]
struct MemoFaults {
    fail_create_for: HashSet<TreeId>,
    fail_delete_for: HashSet<TreeId>,
    create_delay: Option<Duration>,
}

pub(crate) struct FaultyMemoStore {
    inner: InMemoryMemoStore,
    faults: Mutex<MemoFaults>,
}

impl FaultyMemoStore {
    pub fn new(inner: InMemoryMemoStore) -> Self {
        Self {
            inner,
            faults: Mutex::new(MemoFaults::default()),
        }
    }

    pub fn inner(&self) -> &InMemoryMemoStore {
        &self.inner
    }

    /// Creates (including restores) for `tree` fail with `Unavailable`.
    pub fn fail_create_for(&self, tree: &TreeId) {
        self.faults.lock().unwrap().fail_create_for.insert(tree.clone());
    }

    pub fn fail_delete_for(&self, tree: &TreeId) {
        self.faults.lock().unwrap().fail_delete_for.insert(tree.clone());
    }

    pub fn delay_creates(&self, delay: Duration) {
        self.faults.lock().unwrap().create_delay = Some(delay);
    }
}

#[async_trait]
impl MemoStore for FaultyMemoStore {
    async fn create_memo(&self, user: &UserId, tree: &TreeId, seed: MemoSeed) -> MemoResult<Memo> {
        let (delay, fail) = {
            let faults = self.faults.lock().unwrap();
            (faults.create_delay, faults.fail_create_for.contains(tree))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(MemoError::Unavailable("injected memo create failure".into()));
        }
        self.inner.create_memo(user, tree, seed).await
    }

    async fn get_memo(&self, user: &UserId, tree: &TreeId) -> MemoResult<Memo> {
        self.inner.get_memo(user, tree).await
    }

    async fn update_memo(&self, user: &UserId, tree: &TreeId, content: String) -> MemoResult<Memo> {
        self.inner.update_memo(user, tree, content).await
    }

    async fn delete_memo(&self, user: &UserId, tree: &TreeId) -> MemoResult<Memo> {
        let fail = self.faults.lock().unwrap().fail_delete_for.contains(tree);
        if fail {
            return Err(MemoError::Unavailable("injected memo delete failure".into()));
        }
        self.inner.delete_memo(user, tree).await
    }
}
