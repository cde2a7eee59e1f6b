//! In-memory hierarchy store for testing and ephemeral use.
//!
//! [`InMemoryHierarchyStore`] keeps forest records and tree nodes in
//! `HashMap`s behind a single `RwLock`. Every operation takes the lock once,
//! which makes each structural call atomic.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use inforest_types::{Forest, ForestId, ForestPatch, NewForest, NewTree, Tree, TreeId, TreePatch, UserId};
use tracing::debug;

use crate::error::{EntityKind, HierarchyError, HierarchyResult};
use crate::traits::HierarchyStore;

#[derive(Clone, Debug)]
struct ForestRecord {
    id: ForestId,
    name: String,
    description: String,
    user_id: UserId,
    root: TreeId,
}

#[derive(Clone, Debug)]
struct Node {
    name: String,
    url: String,
    forest: ForestId,
    parent: Option<TreeId>,
    children: Vec<TreeId>,
}

#[derive(Debug, Default)]
struct Graph {
    forests: HashMap<ForestId, ForestRecord>,
    nodes: HashMap<TreeId, Node>,
}

impl Graph {
    fn node(&self, id: &TreeId) -> HierarchyResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| HierarchyError::tree_not_found(id))
    }

    fn build_tree(&self, id: &TreeId, include_children: bool) -> HierarchyResult<Tree> {
        let node = self.node(id)?;
        let mut tree = Tree::leaf(id.clone(), node.name.clone(), node.url.clone());
        if include_children {
            for child in &node.children {
                tree.children.push(self.build_tree(child, true)?);
            }
        }
        Ok(tree)
    }

    fn build_forest(&self, record: &ForestRecord, include_children: bool) -> HierarchyResult<Forest> {
        Ok(Forest {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            user_id: record.user_id.clone(),
            root: self.build_tree(&record.root, include_children)?,
        })
    }

    fn subtree_ids(&self, id: &TreeId) -> HierarchyResult<Vec<TreeId>> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            let node = self.node(&next)?;
            stack.extend(node.children.iter().rev().cloned());
            out.push(next);
        }
        Ok(out)
    }

    fn remove_subtree(&mut self, id: &TreeId) -> HierarchyResult<Vec<TreeId>> {
        let removed = self.subtree_ids(id)?;
        let parent = self.node(id)?.parent.clone();
        if let Some(parent) = parent {
            if let Some(parent) = self.nodes.get_mut(&parent) {
                parent.children.retain(|c| c != id);
            }
        }
        for tree_id in &removed {
            self.nodes.remove(tree_id);
        }
        Ok(removed)
    }
}

/// An in-memory implementation of [`HierarchyStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryHierarchyStore {
    graph: RwLock<Graph>,
}

impl InMemoryHierarchyStore {
    /// Create a new empty hierarchy store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tree nodes across all forests.
    pub fn tree_count(&self) -> usize {
        self.read().map(|g| g.nodes.len()).unwrap_or(0)
    }

    /// Number of forest records.
    pub fn forest_count(&self) -> usize {
        self.read().map(|g| g.forests.len()).unwrap_or(0)
    }

    /// Whether a tree node with this id is present.
    pub fn contains_tree(&self, id: &TreeId) -> bool {
        self.read().map(|g| g.nodes.contains_key(id)).unwrap_or(false)
    }

    fn read(&self) -> HierarchyResult<RwLockReadGuard<'_, Graph>> {
        self.graph
            .read()
            .map_err(|e| HierarchyError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> HierarchyResult<RwLockWriteGuard<'_, Graph>> {
        self.graph
            .write()
            .map_err(|e| HierarchyError::Unavailable(format!("lock poisoned: {e}")))
    }
}

fn require_name(tree: &NewTree) -> HierarchyResult<()> {
    if tree.name.trim().is_empty() {
        return Err(HierarchyError::Invalid(format!("tree {} has no name", tree.id)));
    }
    Ok(())
}

#[async_trait]
impl HierarchyStore for InMemoryHierarchyStore {
    async fn create_forest(&self, forest: NewForest) -> HierarchyResult<Forest> {
        require_name(&forest.root)?;
        let mut graph = self.write()?;
        if graph.nodes.contains_key(&forest.root.id) {
            return Err(HierarchyError::AlreadyExists {
                kind: EntityKind::Tree,
                id: forest.root.id.to_string(),
            });
        }

        let id = ForestId::generate();
        if graph.forests.contains_key(&id) {
            return Err(HierarchyError::AlreadyExists {
                kind: EntityKind::Forest,
                id: id.to_string(),
            });
        }
        let record = ForestRecord {
            id: id.clone(),
            name: forest.name,
            description: forest.description,
            user_id: forest.user_id,
            root: forest.root.id.clone(),
        };
        graph.nodes.insert(
            forest.root.id.clone(),
            Node {
                name: forest.root.name,
                url: forest.root.url,
                forest: id.clone(),
                parent: None,
                children: Vec::new(),
            },
        );
        graph.forests.insert(id.clone(), record.clone());
        debug!(forest_id = %id, root_id = %record.root, "forest created");
        graph.build_forest(&record, false)
    }

    async fn create_tree(&self, tree: NewTree, parent_id: &TreeId) -> HierarchyResult<TreeId> {
        require_name(&tree)?;
        let mut graph = self.write()?;
        let forest = graph.node(parent_id)?.forest.clone();
        if graph.nodes.contains_key(&tree.id) {
            return Err(HierarchyError::AlreadyExists {
                kind: EntityKind::Tree,
                id: tree.id.to_string(),
            });
        }

        graph.nodes.insert(
            tree.id.clone(),
            Node {
                name: tree.name,
                url: tree.url,
                forest,
                parent: Some(parent_id.clone()),
                children: Vec::new(),
            },
        );
        if let Some(parent) = graph.nodes.get_mut(parent_id) {
            parent.children.push(tree.id.clone());
        }
        debug!(tree_id = %tree.id, parent_id = %parent_id, "tree created");
        Ok(tree.id)
    }

    async fn get_forest(&self, id: &ForestId, include_children: bool) -> HierarchyResult<Forest> {
        let graph = self.read()?;
        let record = graph
            .forests
            .get(id)
            .ok_or_else(|| HierarchyError::forest_not_found(id))?;
        graph.build_forest(record, include_children)
    }

    async fn get_tree(&self, id: &TreeId, include_children: bool) -> HierarchyResult<Tree> {
        self.read()?.build_tree(id, include_children)
    }

    async fn forest_of(&self, id: &TreeId) -> HierarchyResult<ForestId> {
        Ok(self.read()?.node(id)?.forest.clone())
    }

    async fn get_forests_by_user(
        &self,
        user: &UserId,
        include_children: bool,
    ) -> HierarchyResult<Vec<Forest>> {
        let graph = self.read()?;
        let mut forests = graph
            .forests
            .values()
            .filter(|r| &r.user_id == user)
            .map(|r| graph.build_forest(r, include_children))
            .collect::<HierarchyResult<Vec<_>>>()?;
        forests.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(forests)
    }

    async fn update_forest(&self, patch: &ForestPatch) -> HierarchyResult<Forest> {
        let mut graph = self.write()?;
        let record = graph
            .forests
            .get_mut(&patch.id)
            .ok_or_else(|| HierarchyError::forest_not_found(&patch.id))?;
        if let Some(name) = &patch.name {
            record.name = name.clone();
        }
        if let Some(description) = &patch.description {
            record.description = description.clone();
        }
        let record = record.clone();
        graph.build_forest(&record, false)
    }

    async fn update_tree(&self, patch: &TreePatch) -> HierarchyResult<Tree> {
        let mut graph = self.write()?;
        let node = graph
            .nodes
            .get_mut(&patch.id)
            .ok_or_else(|| HierarchyError::tree_not_found(&patch.id))?;
        if let Some(name) = &patch.name {
            node.name = name.clone();
        }
        if let Some(url) = &patch.url {
            node.url = url.clone();
        }
        graph.build_tree(&patch.id, false)
    }

    async fn delete_forest(&self, id: &ForestId) -> HierarchyResult<Vec<TreeId>> {
        let mut graph = self.write()?;
        let root = graph
            .forests
            .get(id)
            .map(|r| r.root.clone())
            .ok_or_else(|| HierarchyError::forest_not_found(id))?;
        let removed = graph.remove_subtree(&root)?;
        graph.forests.remove(id);
        debug!(forest_id = %id, removed = removed.len(), "forest deleted");
        Ok(removed)
    }

    async fn delete_tree(&self, id: &TreeId, cascade: bool) -> HierarchyResult<Vec<TreeId>> {
        let mut graph = self.write()?;
        let node = graph.node(id)?;
        if !cascade && !node.children.is_empty() {
            return Err(HierarchyError::HasChildren {
                id: id.clone(),
                children: node.children.len(),
            });
        }
        if node.parent.is_none() {
            return Err(HierarchyError::RootOfForest {
                id: id.clone(),
                forest: node.forest.clone(),
            });
        }
        let removed = graph.remove_subtree(id)?;
        debug!(tree_id = %id, cascade, removed = removed.len(), "tree deleted");
        Ok(removed)
    }
}
