//! JSON messages exchanged over the RPC surface.
//!
//! Wire structs use plain strings so that a malformed request can still be
//! decoded and then rejected with a precise error. Conversion into the
//! validated domain types happens through `TryFrom`.

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::forest::{Forest, ForestPatch, NewTree, Tree, TreePatch};
use crate::id::{ForestId, TreeId};
use crate::memo::Memo;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeMsg {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub children: Vec<TreeMsg>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestMsg {
    pub id: String,
    pub name: String,
    pub description: String,
    pub user_id: String,
    pub root: Option<TreeMsg>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoMsg {
    pub user_id: String,
    pub tree_id: String,
    pub content: Option<String>,
    pub version: u64,
}

impl From<&Tree> for TreeMsg {
    fn from(tree: &Tree) -> Self {
        Self {
            id: tree.id.to_string(),
            name: tree.name.clone(),
            url: tree.url.clone(),
            children: tree.children.iter().map(TreeMsg::from).collect(),
        }
    }
}

impl From<&Forest> for ForestMsg {
    fn from(forest: &Forest) -> Self {
        Self {
            id: forest.id.to_string(),
            name: forest.name.clone(),
            description: forest.description.clone(),
            user_id: forest.user_id.to_string(),
            root: Some(TreeMsg::from(&forest.root)),
        }
    }
}

impl From<&Memo> for MemoMsg {
    fn from(memo: &Memo) -> Self {
        Self {
            user_id: memo.user_id.to_string(),
            tree_id: memo.tree_id.to_string(),
            content: memo.content.clone(),
            version: memo.version,
        }
    }
}

impl TryFrom<TreeMsg> for NewTree {
    type Error = TypeError;

    fn try_from(msg: TreeMsg) -> Result<Self, Self::Error> {
        Ok(NewTree::new(TreeId::new(msg.id)?, msg.name, msg.url))
    }
}

// ---- GetForestsByUser ----

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetForestsByUserRequest {
    #[serde(default)]
    pub include_children: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetForestsByUserResponse {
    pub forests: Vec<ForestMsg>,
}

// ---- Forest CRUD ----

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateForestRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub root: Option<TreeMsg>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetForestRequest {
    pub forest_id: String,
    #[serde(default)]
    pub include_children: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetForestResponse {
    pub forest: ForestMsg,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateForestRequest {
    pub forest_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TryFrom<UpdateForestRequest> for ForestPatch {
    type Error = TypeError;

    fn try_from(req: UpdateForestRequest) -> Result<Self, Self::Error> {
        Ok(ForestPatch {
            id: ForestId::new(req.forest_id)?,
            name: req.name,
            description: req.description,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeleteForestRequest {
    pub forest_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeleteForestResponse {
    pub success: bool,
}

// ---- Tree CRUD ----

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateTreeRequest {
    pub parent_id: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateTreeResponse {
    pub tree: TreeMsg,
    pub memo: MemoMsg,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetTreeRequest {
    pub tree_id: String,
    #[serde(default)]
    pub include_children: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateTreeRequest {
    pub tree_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl TryFrom<UpdateTreeRequest> for TreePatch {
    type Error = TypeError;

    fn try_from(req: UpdateTreeRequest) -> Result<Self, Self::Error> {
        Ok(TreePatch {
            id: TreeId::new(req.tree_id)?,
            name: req.name,
            url: req.url,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeleteTreeRequest {
    pub tree_id: String,
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeleteTreeResponse {
    pub success: bool,
}

// ---- Memo ----

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetMemoRequest {
    pub tree_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateMemoRequest {
    pub tree_id: String,
    pub content: String,
}

// ---- Errors ----

/// Error body returned for every failed RPC.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable category, e.g. `"not_found"` or `"quarantine"`.
    pub code: String,
    pub message: String,
    /// Some state was left behind by a failed composite operation.
    #[serde(default)]
    pub partial: bool,
    /// The stores diverged and need manual reconciliation.
    #[serde(default)]
    pub quarantine: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::UserId;

    #[test]
    fn forest_to_wire_keeps_nested_children() {
        let mut root = Tree::leaf(TreeId::new("root-1").unwrap(), "root", "http://r");
        root.children
            .push(Tree::leaf(TreeId::new("t2").unwrap(), "Notes", "http://x"));
        let forest = Forest {
            id: ForestId::new("f1").unwrap(),
            name: "Alpha".into(),
            description: String::new(),
            user_id: UserId::new("u1").unwrap(),
            root,
        };
        let msg = ForestMsg::from(&forest);
        let root = msg.root.unwrap();
        assert_eq!(root.id, "root-1");
        assert_eq!(root.children[0].id, "t2");
        assert_eq!(msg.user_id, "u1");
    }

    #[test]
    fn tree_msg_without_id_is_rejected() {
        let msg = TreeMsg {
            id: String::new(),
            name: "x".into(),
            ..Default::default()
        };
        assert_eq!(
            NewTree::try_from(msg).unwrap_err(),
            TypeError::EmptyId { kind: "tree" }
        );
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let req: DeleteTreeRequest = serde_json::from_str(r#"{"tree_id":"t2"}"#).unwrap();
        assert!(!req.cascade);
        let req: UpdateTreeRequest =
            serde_json::from_str(r#"{"tree_id":"t2","name":"n"}"#).unwrap();
        let patch = TreePatch::try_from(req).unwrap();
        assert_eq!(patch.name.as_deref(), Some("n"));
        assert!(patch.url.is_none());
    }
}
