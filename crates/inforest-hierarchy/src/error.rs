//! Error types for hierarchy store operations.

use std::fmt;

use inforest_types::{ForestId, TreeId};
use thiserror::Error;

/// Which kind of structural record an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Forest,
    Tree,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forest => f.write_str("forest"),
            Self::Tree => f.write_str("tree"),
        }
    }
}

/// Errors that can occur during hierarchy store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HierarchyError {
    /// The referenced forest or tree does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A forest or tree with this id already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: EntityKind, id: String },

    /// The request is missing required fields.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Non-cascading delete of a tree that still has children.
    #[error("tree {id} has {children} children; delete with cascade to remove them")]
    HasChildren { id: TreeId, children: usize },

    /// A forest root can only be removed together with its forest.
    #[error("tree {id} is the root of forest {forest}; delete the forest instead")]
    RootOfForest { id: TreeId, forest: ForestId },

    /// The backend could not be reached or failed internally.
    #[error("hierarchy store unavailable: {0}")]
    Unavailable(String),
}

impl HierarchyError {
    pub fn forest_not_found(id: &ForestId) -> Self {
        Self::NotFound {
            kind: EntityKind::Forest,
            id: id.to_string(),
        }
    }

    pub fn tree_not_found(id: &TreeId) -> Self {
        Self::NotFound {
            kind: EntityKind::Tree,
            id: id.to_string(),
        }
    }
}

/// Convenience type alias for hierarchy operations.
pub type HierarchyResult<T> = std::result::Result<T, HierarchyError>;
