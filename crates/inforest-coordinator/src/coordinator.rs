//! The [`Coordinator`]: composite operations over the hierarchy and memo
//! stores.
//!
//! Composite operations commit a structural change first and then bring the
//! memo store in line. If the memo side fails, a create undoes its
//! structural change and a delete puts the memos it already removed back.
//! Each composite operation runs through [`saga::settle`] from its first
//! store call on, so a dropped caller cannot interrupt it halfway. A
//! structural call that outlives the caller's deadline is waited out
//! rather than abandoned, since it may still commit.

use std::collections::HashSet;
use std::sync::Arc;

use inforest_hierarchy::{HierarchyError, HierarchyStore};
use inforest_memo::{MemoError, MemoStore};
use inforest_types::{
    Forest, ForestId, ForestPatch, Memo, MemoSeed, NewForest, NewTree, Tree, TreeId, TreePatch,
    UserId,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::error::{CompensationFailure, CoordinatorError, CoordinatorResult, QuarantineReport};
use crate::saga::{self, Attempt, Operation, Saga, SagaStage, Step};

/// Result of a successful `create_tree`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedTree {
    pub tree: Tree,
    pub memo: Memo,
}

/// What a successful cascade delete removed from each store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Tree ids removed by the structural delete, parent before children.
    pub removed_trees: Vec<TreeId>,
    /// Memos deleted, in deletion order.
    pub deleted_memos: Vec<Memo>,
    /// Removed trees that had no memo to delete.
    pub missing_memos: Vec<TreeId>,
    /// Ids the hierarchy store reported more than once. Only the first
    /// occurrence is processed.
    pub duplicate_ids: Vec<TreeId>,
}

/// Structural change made by step 1 of a create.
enum Created {
    Forest(ForestId),
    Tree(TreeId),
}

/// Composes operations across a [`HierarchyStore`] and a [`MemoStore`].
///
/// Holds nothing but the two store handles, so clones are cheap and
/// concurrent calls share no mutable state.
pub struct Coordinator<H: ?Sized, M: ?Sized> {
    hierarchy: Arc<H>,
    memos: Arc<M>,
}

impl<H: ?Sized, M: ?Sized> Clone for Coordinator<H, M> {
    fn clone(&self) -> Self {
        Self {
            hierarchy: Arc::clone(&self.hierarchy),
            memos: Arc::clone(&self.memos),
        }
    }
}

impl<H, M> Coordinator<H, M>
where
    H: HierarchyStore + ?Sized + 'static,
    M: MemoStore + ?Sized + 'static,
{
    pub fn new(hierarchy: Arc<H>, memos: Arc<M>) -> Self {
        Self { hierarchy, memos }
    }

    // -----------------------------------------------------------------------
    // Composite operations
    // -----------------------------------------------------------------------

    /// Create a forest owned by the caller, its root node, and the root's
    /// empty memo.
    ///
    /// If the memo cannot be created, or the forest was only created after
    /// the deadline, the forest is deleted again.
    pub async fn create_forest(
        &self,
        ctx: &RequestContext,
        name: String,
        description: String,
        root: NewTree,
    ) -> CoordinatorResult<Forest> {
        let user = ctx.user()?.clone();
        let root_id = root.id.clone();
        let mut saga = Saga::begin(Operation::CreateForest, root_id.as_str(), ctx.request_id());
        let new_forest = NewForest {
            name,
            description,
            user_id: user.clone(),
            root,
        };

        let hierarchy = Arc::clone(&self.hierarchy);
        let memos = Arc::clone(&self.memos);
        let deadline = ctx.deadline();
        let forest = saga::settle(Operation::CreateForest, root_id.to_string(), async move {
            let created =
                saga::attempt(deadline, Step::StructuralCreate, hierarchy.create_forest(new_forest))
                    .await?;
            let (forest, late) = match created {
                Attempt::OnTime(forest) => (forest, false),
                Attempt::Late(forest) => (forest, true),
            };
            saga.subject = forest.id.to_string();
            saga.advance(SagaStage::StructureCommitted);

            let undo = Created::Forest(forest.id.clone());
            if late {
                let trigger = CoordinatorError::DeadlineExceeded(Step::StructuralCreate);
                let err = undo_create(
                    &*hierarchy,
                    &*memos,
                    &user,
                    &root_id,
                    undo,
                    Step::StructuralCreate,
                    trigger,
                    saga,
                )
                .await;
                return Err(err);
            }
            seed_memo(&*hierarchy, &*memos, &user, &root_id, undo, deadline, saga).await?;
            Ok(forest)
        })
        .await?;

        info!(
            forest_id = %forest.id,
            root_id = %forest.root.id,
            user_id = %forest.user_id,
            "forest created"
        );
        Ok(forest)
    }

    /// Attach a new leaf under `parent_id` and create its empty memo.
    ///
    /// The caller must own the parent's forest. On success both the node
    /// and the memo exist. On any error other than
    /// [`CoordinatorError::Quarantine`] the node is absent.
    pub async fn create_tree(
        &self,
        ctx: &RequestContext,
        parent_id: &TreeId,
        tree: NewTree,
    ) -> CoordinatorResult<CreatedTree> {
        let user = ctx.user()?.clone();
        self.ensure_tree_owner(ctx, &user, parent_id).await?;
        let mut saga = Saga::begin(Operation::CreateTree, tree.id.as_str(), ctx.request_id());
        let node = tree.clone().into_tree();

        let hierarchy = Arc::clone(&self.hierarchy);
        let memos = Arc::clone(&self.memos);
        let deadline = ctx.deadline();
        let parent = parent_id.clone();
        let memo = saga::settle(Operation::CreateTree, node.id.to_string(), async move {
            let created =
                saga::attempt(deadline, Step::StructuralCreate, hierarchy.create_tree(tree, &parent))
                    .await?;
            saga.advance(SagaStage::StructureCommitted);

            let tree_id = match created {
                Attempt::OnTime(id) => id,
                Attempt::Late(id) => {
                    let trigger = CoordinatorError::DeadlineExceeded(Step::StructuralCreate);
                    let undo = Created::Tree(id.clone());
                    let err = undo_create(
                        &*hierarchy,
                        &*memos,
                        &user,
                        &id,
                        undo,
                        Step::StructuralCreate,
                        trigger,
                        saga,
                    )
                    .await;
                    return Err(err);
                }
            };
            let undo = Created::Tree(tree_id.clone());
            seed_memo(&*hierarchy, &*memos, &user, &tree_id, undo, deadline, saga).await
        })
        .await?;

        info!(tree_id = %memo.tree_id, parent_id = %parent_id, user_id = %memo.user_id, "tree created");
        Ok(CreatedTree {
            tree: Tree { id: memo.tree_id.clone(), ..node },
            memo,
        })
    }

    /// Delete a forest owned by the caller, then every memo of its trees.
    ///
    /// The structural delete is never undone. If a memo deletion fails the
    /// memos deleted before it are recreated and the caller receives
    /// [`CoordinatorError::PartiallyApplied`].
    pub async fn delete_forest(
        &self,
        ctx: &RequestContext,
        forest_id: &ForestId,
    ) -> CoordinatorResult<CascadeOutcome> {
        let user = ctx.user()?.clone();
        self.ensure_owner(ctx, &user, forest_id).await?;
        let mut saga = Saga::begin(Operation::DeleteForest, forest_id.as_str(), ctx.request_id());

        let hierarchy = Arc::clone(&self.hierarchy);
        let memos = Arc::clone(&self.memos);
        let deadline = ctx.deadline();
        let id = forest_id.clone();
        saga::settle(Operation::DeleteForest, forest_id.to_string(), async move {
            let removed =
                saga::attempt(deadline, Step::StructuralDelete, hierarchy.delete_forest(&id)).await?;
            let removed = committed_delete(removed, &saga);
            saga.advance(SagaStage::StructureCommitted);
            info!(forest_id = %id, removed = removed.len(), "forest structure deleted");
            purge_memos(&*memos, &user, removed, saga).await
        })
        .await
    }

    /// Delete a tree node (and with `cascade` its subtree), then the memos
    /// of every removed node.
    ///
    /// The caller must own the tree's forest. Without `cascade` a node with
    /// children fails `Conflict` and neither store is touched. Forest roots
    /// are refused; delete the forest.
    pub async fn delete_tree(
        &self,
        ctx: &RequestContext,
        tree_id: &TreeId,
        cascade: bool,
    ) -> CoordinatorResult<CascadeOutcome> {
        let user = ctx.user()?.clone();
        self.ensure_tree_owner(ctx, &user, tree_id).await?;
        let mut saga = Saga::begin(Operation::DeleteTree, tree_id.as_str(), ctx.request_id());

        let hierarchy = Arc::clone(&self.hierarchy);
        let memos = Arc::clone(&self.memos);
        let deadline = ctx.deadline();
        let id = tree_id.clone();
        saga::settle(Operation::DeleteTree, tree_id.to_string(), async move {
            let removed = saga::attempt(
                deadline,
                Step::StructuralDelete,
                hierarchy.delete_tree(&id, cascade),
            )
            .await?;
            let removed = committed_delete(removed, &saga);
            saga.advance(SagaStage::StructureCommitted);
            info!(tree_id = %id, cascade, removed = removed.len(), "tree structure deleted");
            purge_memos(&*memos, &user, removed, saga).await
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Pass-through operations
    // -----------------------------------------------------------------------

    /// Forests owned by the caller. Empty when there are none.
    pub async fn get_forests_by_user(
        &self,
        ctx: &RequestContext,
        include_children: bool,
    ) -> CoordinatorResult<Vec<Forest>> {
        let user = ctx.user()?;
        ctx.bounded(Step::Lookup, self.hierarchy.get_forests_by_user(user, include_children))
            .await
    }

    /// Fetch a forest. Does not require an identity.
    pub async fn get_forest(
        &self,
        ctx: &RequestContext,
        forest_id: &ForestId,
        include_children: bool,
    ) -> CoordinatorResult<Forest> {
        ctx.bounded(Step::Lookup, self.hierarchy.get_forest(forest_id, include_children))
            .await
    }

    pub async fn update_forest(
        &self,
        ctx: &RequestContext,
        patch: ForestPatch,
    ) -> CoordinatorResult<Forest> {
        let user = ctx.user()?;
        self.ensure_owner(ctx, user, &patch.id).await?;
        let forest = ctx
            .bounded(Step::StructuralUpdate, self.hierarchy.update_forest(&patch))
            .await?;
        debug!(forest_id = %forest.id, "forest updated");
        Ok(forest)
    }

    /// Fetch a tree node. Does not require an identity.
    pub async fn get_tree(
        &self,
        ctx: &RequestContext,
        tree_id: &TreeId,
        include_children: bool,
    ) -> CoordinatorResult<Tree> {
        ctx.bounded(Step::Lookup, self.hierarchy.get_tree(tree_id, include_children))
            .await
    }

    /// Rename or re-point a node in a forest the caller owns.
    pub async fn update_tree(&self, ctx: &RequestContext, patch: TreePatch) -> CoordinatorResult<Tree> {
        let user = ctx.user()?;
        self.ensure_tree_owner(ctx, user, &patch.id).await?;
        let tree = ctx
            .bounded(Step::StructuralUpdate, self.hierarchy.update_tree(&patch))
            .await?;
        debug!(tree_id = %tree.id, "tree updated");
        Ok(tree)
    }

    /// The caller's memo for `tree_id`.
    pub async fn get_memo(&self, ctx: &RequestContext, tree_id: &TreeId) -> CoordinatorResult<Memo> {
        let user = ctx.user()?;
        ctx.bounded(Step::MemoRead, self.memos.get_memo(user, tree_id)).await
    }

    /// Replace the caller's memo content for `tree_id`, bumping its version.
    pub async fn update_memo(
        &self,
        ctx: &RequestContext,
        tree_id: &TreeId,
        content: String,
    ) -> CoordinatorResult<Memo> {
        let user = ctx.user()?;
        let memo = ctx
            .bounded(Step::MemoUpdate, self.memos.update_memo(user, tree_id, content))
            .await?;
        debug!(tree_id = %tree_id, version = memo.version, "memo updated");
        Ok(memo)
    }

    async fn ensure_owner(
        &self,
        ctx: &RequestContext,
        user: &UserId,
        forest_id: &ForestId,
    ) -> CoordinatorResult<()> {
        let forest = ctx
            .bounded(Step::Lookup, self.hierarchy.get_forest(forest_id, false))
            .await?;
        if &forest.user_id != user {
            warn!(forest_id = %forest_id, user_id = %user, "forest access by non-owner refused");
            return Err(CoordinatorError::PermissionDenied(format!(
                "forest {forest_id} belongs to another user"
            )));
        }
        Ok(())
    }

    /// Ownership check for a node, via the forest it belongs to.
    async fn ensure_tree_owner(
        &self,
        ctx: &RequestContext,
        user: &UserId,
        tree_id: &TreeId,
    ) -> CoordinatorResult<()> {
        let forest_id = ctx
            .bounded(Step::Lookup, self.hierarchy.forest_of(tree_id))
            .await?;
        self.ensure_owner(ctx, user, &forest_id).await
    }
}

/// Unwrap a committed structural delete. One that finished after the
/// deadline still removed the trees, so the cascade goes on regardless.
fn committed_delete(removed: Attempt<Vec<TreeId>>, saga: &Saga) -> Vec<TreeId> {
    match removed {
        Attempt::OnTime(ids) => ids,
        Attempt::Late(ids) => {
            warn!(
                operation = %saga.operation,
                subject = %saga.subject,
                removed = ids.len(),
                "structural delete committed after the deadline; finishing the cascade"
            );
            ids
        }
    }
}

/// Create the empty memo for a freshly created node, undoing the structure
/// if that fails.
async fn seed_memo<H, M>(
    hierarchy: &H,
    memos: &M,
    user: &UserId,
    tree_id: &TreeId,
    created: Created,
    deadline: Option<Instant>,
    mut saga: Saga,
) -> CoordinatorResult<Memo>
where
    H: HierarchyStore + ?Sized,
    M: MemoStore + ?Sized,
{
    let seeded = saga::bounded(
        deadline,
        Step::MemoCreate,
        memos.create_memo(user, tree_id, MemoSeed::empty()),
    )
    .await;
    match seeded {
        Ok(memo) => {
            saga.advance(SagaStage::Completed);
            Ok(memo)
        }
        Err(trigger) => Err(undo_create(
            hierarchy,
            memos,
            user,
            tree_id,
            created,
            Step::MemoCreate,
            trigger,
            saga,
        )
        .await),
    }
}

/// Undo step 1 of a create after `failed_step` went wrong.
///
/// A memo step that timed out has an unknown outcome, so any memo it may
/// have written is removed before the structure. Nodes that turn up in the
/// structural undo besides `tree_id` were attached concurrently; their
/// memos are removed with them. Compensation calls run without a deadline.
#[allow(clippy::too_many_arguments)]
async fn undo_create<H, M>(
    hierarchy: &H,
    memos: &M,
    user: &UserId,
    tree_id: &TreeId,
    created: Created,
    failed_step: Step,
    trigger: CoordinatorError,
    mut saga: Saga,
) -> CoordinatorError
where
    H: HierarchyStore + ?Sized,
    M: MemoStore + ?Sized,
{
    saga.advance(SagaStage::Compensating);
    warn!(tree_id = %tree_id, step = %failed_step, error = %trigger, "create failed; removing structure");

    let mut failures = Vec::new();
    let mut stale = Vec::new();
    let mut memo_left = false;
    if failed_step == Step::MemoCreate && matches!(trigger, CoordinatorError::DeadlineExceeded(_)) {
        match memos.delete_memo(user, tree_id).await {
            Ok(_) => debug!(tree_id = %tree_id, "discarded memo written after the deadline"),
            Err(MemoError::NotFound { .. }) => {}
            Err(err) => {
                memo_left = true;
                failures.push(CompensationFailure {
                    step: Step::DiscardMemo,
                    tree_id: Some(tree_id.clone()),
                    error: err.to_string(),
                });
            }
        }
    }

    let removed = match &created {
        Created::Forest(id) => hierarchy.delete_forest(id).await,
        Created::Tree(id) => hierarchy.delete_tree(id, true).await,
    };
    let mut structure_left = false;
    match removed {
        Ok(ids) => {
            let mut seen = HashSet::from([tree_id]);
            for extra in ids.iter().filter(|id| seen.insert(*id)) {
                warn!(tree_id = %extra, subject = %saga.subject, "removing memo of a node attached before the undo");
                match memos.delete_memo(user, extra).await {
                    Ok(_) | Err(MemoError::NotFound { .. }) => {}
                    Err(err) => {
                        failures.push(CompensationFailure {
                            step: Step::DiscardMemo,
                            tree_id: Some(extra.clone()),
                            error: err.to_string(),
                        });
                        stale.push(extra.clone());
                    }
                }
            }
        }
        Err(HierarchyError::NotFound { .. }) => {}
        Err(err) => {
            structure_left = true;
            failures.push(CompensationFailure {
                step: Step::RemoveStructure,
                tree_id: Some(tree_id.clone()),
                error: err.to_string(),
            });
        }
    }

    if failures.is_empty() {
        saga.advance(SagaStage::Compensated);
        return CoordinatorError::RolledBack {
            operation: saga.operation,
            step: failed_step,
            source: Box::new(trigger),
        };
    }

    saga.advance(SagaStage::CompensationFailed);
    let mut report = QuarantineReport::new(saga.operation, saga.subject.clone(), failed_step, trigger);
    report.failures = failures;
    if structure_left && !memo_left {
        report.orphaned_trees.push(tree_id.clone());
    }
    if memo_left && !structure_left {
        report.stale_memos.push(tree_id.clone());
    }
    report.stale_memos.extend(stale);
    CoordinatorError::Quarantine(Box::new(report))
}

/// Delete the caller's memo for every id a structural delete removed.
///
/// Runs after the structural delete committed and is never bounded by the
/// caller's deadline.
async fn purge_memos<M>(
    memos: &M,
    user: &UserId,
    removed: Vec<TreeId>,
    mut saga: Saga,
) -> CoordinatorResult<CascadeOutcome>
where
    M: MemoStore + ?Sized,
{
    let mut seen = HashSet::with_capacity(removed.len());
    let mut outcome = CascadeOutcome::default();

    for (idx, tree_id) in removed.iter().enumerate() {
        if !seen.insert(tree_id) {
            warn!(tree_id = %tree_id, subject = %saga.subject, "duplicate id in structural delete result; skipping");
            outcome.duplicate_ids.push(tree_id.clone());
            continue;
        }
        match memos.delete_memo(user, tree_id).await {
            Ok(memo) => outcome.deleted_memos.push(memo),
            Err(MemoError::NotFound { .. }) => {
                debug!(tree_id = %tree_id, "no memo for removed tree");
                outcome.missing_memos.push(tree_id.clone());
            }
            Err(err) => {
                let trigger = CoordinatorError::from(err);
                let mut untouched = vec![tree_id.clone()];
                for rest in &removed[idx + 1..] {
                    if seen.insert(rest) {
                        untouched.push(rest.clone());
                    }
                }
                return Err(restore_memos(memos, user, &outcome.deleted_memos, untouched, trigger, saga).await);
            }
        }
    }

    saga.advance(SagaStage::Completed);
    info!(
        subject = %saga.subject,
        trees = removed.len(),
        memos = outcome.deleted_memos.len(),
        missing = outcome.missing_memos.len(),
        "cascade delete completed"
    );
    outcome.removed_trees = removed;
    Ok(outcome)
}

/// Recreate `deleted` with their captured content and version after a memo
/// deletion failed part way through a cascade.
async fn restore_memos<M>(
    memos: &M,
    user: &UserId,
    deleted: &[Memo],
    untouched: Vec<TreeId>,
    trigger: CoordinatorError,
    mut saga: Saga,
) -> CoordinatorError
where
    M: MemoStore + ?Sized,
{
    saga.advance(SagaStage::Compensating);
    warn!(
        subject = %saga.subject,
        tree_id = %untouched[0],
        step = %Step::MemoDelete,
        error = %trigger,
        to_restore = deleted.len(),
        "memo delete failed; restoring deleted memos"
    );

    let mut restored = Vec::with_capacity(deleted.len());
    let mut lost = Vec::new();
    let mut failures = Vec::new();
    for memo in deleted {
        match memos.create_memo(user, &memo.tree_id, MemoSeed::restore(memo)).await {
            Ok(_) => restored.push(memo.tree_id.clone()),
            Err(err) => {
                failures.push(CompensationFailure {
                    step: Step::RestoreMemos,
                    tree_id: Some(memo.tree_id.clone()),
                    error: err.to_string(),
                });
                lost.push(memo.tree_id.clone());
            }
        }
    }

    if failures.is_empty() {
        saga.advance(SagaStage::Compensated);
        return CoordinatorError::PartiallyApplied {
            operation: saga.operation,
            subject: saga.subject.clone(),
            step: Step::MemoDelete,
            restored,
            untouched,
            source: Box::new(trigger),
        };
    }

    saga.advance(SagaStage::CompensationFailed);
    let mut report = QuarantineReport::new(saga.operation, saga.subject.clone(), Step::MemoDelete, trigger);
    report.failures = failures;
    report.restored_memos = restored;
    report.lost_memos = lost;
    report.stale_memos = untouched;
    CoordinatorError::Quarantine(Box::new(report))
}
