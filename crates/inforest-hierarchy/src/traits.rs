//! The [`HierarchyStore`] trait defining the structural storage interface.
//!
//! Any backend (in-memory, graph database, remote service) implements this
//! trait. The coordinator only ever talks to the hierarchy through it.

use async_trait::async_trait;
use inforest_types::{Forest, ForestId, ForestPatch, NewForest, NewTree, Tree, TreeId, TreePatch, UserId};

use crate::error::HierarchyResult;

/// Storage backend for the forest/tree graph.
///
/// Implementations must be thread-safe and every method must be atomic on
/// its own: either the whole structural change is visible or none of it is.
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    /// Create a forest record and its root tree as one structural change.
    ///
    /// The store assigns the forest id. Fails with `AlreadyExists` if the
    /// root tree id is taken and `Invalid` if the root is missing a name.
    async fn create_forest(&self, forest: NewForest) -> HierarchyResult<Forest>;

    /// Attach a new leaf under an existing parent and return its id.
    ///
    /// Fails with `NotFound` if the parent is absent and `AlreadyExists` if
    /// the tree id collides with any tree in the store.
    async fn create_tree(&self, tree: NewTree, parent_id: &TreeId) -> HierarchyResult<TreeId>;

    /// Fetch a forest. With `include_children` the root carries its full
    /// subtree, otherwise only the root node itself.
    async fn get_forest(&self, id: &ForestId, include_children: bool) -> HierarchyResult<Forest>;

    /// Fetch one tree node, optionally with its full subtree.
    async fn get_tree(&self, id: &TreeId, include_children: bool) -> HierarchyResult<Tree>;

    /// Id of the forest a tree node belongs to.
    async fn forest_of(&self, id: &TreeId) -> HierarchyResult<ForestId>;

    /// All forests owned by `user`. Empty when there are none.
    async fn get_forests_by_user(
        &self,
        user: &UserId,
        include_children: bool,
    ) -> HierarchyResult<Vec<Forest>>;

    /// Replace the fields set in `patch`. Returns the forest root only.
    async fn update_forest(&self, patch: &ForestPatch) -> HierarchyResult<Forest>;

    /// Replace the fields set in `patch`. Returns the node without children.
    async fn update_tree(&self, patch: &TreePatch) -> HierarchyResult<Tree>;

    /// Remove a forest and its entire tree subtree.
    ///
    /// Returns every removed tree id, parent before children.
    async fn delete_forest(&self, id: &ForestId) -> HierarchyResult<Vec<TreeId>>;

    /// Remove a tree node.
    ///
    /// Without `cascade` a node that still has children is left untouched and
    /// `HasChildren` is returned. With `cascade` the node and all
    /// descendants are removed. Forest roots are refused with
    /// `RootOfForest`. Returns every removed id, parent before children.
    async fn delete_tree(&self, id: &TreeId, cascade: bool) -> HierarchyResult<Vec<TreeId>>;
}
