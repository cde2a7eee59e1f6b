//! Forest and tree records.
//!
//! A [`Tree`] returned from a store is either a single node (`children`
//! empty because they were not requested) or a full subtree. Callers know
//! which one they asked for; the type does not distinguish them.

use serde::{Deserialize, Serialize};

use crate::id::{ForestId, TreeId, UserId};

/// A node in a forest's hierarchy, optionally with its expanded subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub id: TreeId,
    pub name: String,
    /// Resource URL the node points at.
    pub url: String,
    /// Child subtrees in stored order.
    #[serde(default)]
    pub children: Vec<Tree>,
}

impl Tree {
    /// A node with no children.
    pub fn leaf(id: TreeId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            children: Vec::new(),
        }
    }

    /// Ids of this node and every descendant, parent before children.
    pub fn ids(&self) -> Vec<TreeId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<TreeId>) {
        out.push(self.id.clone());
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

/// Fields a client supplies to create a tree node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTree {
    pub id: TreeId,
    pub name: String,
    pub url: String,
}

impl NewTree {
    pub fn new(id: TreeId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
        }
    }

    /// The stored form of a freshly created node.
    pub fn into_tree(self) -> Tree {
        Tree::leaf(self.id, self.name, self.url)
    }
}

/// A named hierarchy owned by one user, rooted at exactly one tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forest {
    pub id: ForestId,
    pub name: String,
    pub description: String,
    pub user_id: UserId,
    pub root: Tree,
}

impl Forest {
    /// Every tree id reachable in the loaded root, pre-order.
    pub fn tree_ids(&self) -> Vec<TreeId> {
        self.root.ids()
    }
}

/// Fields needed to create a forest together with its root node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewForest {
    pub name: String,
    pub description: String,
    pub user_id: UserId,
    pub root: NewTree,
}

/// Partial forest update. `None` leaves the field unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestPatch {
    pub id: ForestId,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Partial tree update. `None` leaves the field unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePatch {
    pub id: TreeId,
    pub name: Option<String>,
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(s: &str) -> TreeId {
        TreeId::new(s).unwrap()
    }

    fn sample() -> Tree {
        let mut root = Tree::leaf(tid("r"), "root", "http://r");
        let mut a = Tree::leaf(tid("a"), "a", "http://a");
        a.children.push(Tree::leaf(tid("a1"), "a1", "http://a1"));
        root.children.push(a);
        root.children.push(Tree::leaf(tid("b"), "b", "http://b"));
        root
    }

    #[test]
    fn ids_are_pre_order() {
        let ids: Vec<String> = sample().ids().into_iter().map(String::from).collect();
        assert_eq!(ids, vec!["r", "a", "a1", "b"]);
    }
}
