//! Entity model for inforest.
//!
//! A user owns any number of forests. Each forest is rooted at exactly one
//! [`Tree`], and trees nest under trees to form a single acyclic hierarchy
//! per forest. Every tree node carries a free-text [`Memo`] per owning user,
//! held in a separate store from the hierarchy itself.
//!
//! # Key Types
//!
//! - [`UserId`], [`ForestId`], [`TreeId`]: validated string identifiers
//! - [`Forest`], [`NewForest`], [`ForestPatch`]: forest records
//! - [`Tree`], [`NewTree`], [`TreePatch`]: tree nodes and subtrees
//! - [`Memo`], [`MemoSeed`]: per-(user, tree) content with a version counter
//! - [`wire`]: JSON request/response messages for the RPC surface

pub mod error;
pub mod forest;
pub mod id;
pub mod memo;
pub mod wire;

pub use error::TypeError;
pub use forest::{Forest, ForestPatch, NewForest, NewTree, Tree, TreePatch};
pub use id::{ForestId, TreeId, UserId};
pub use memo::{Memo, MemoSeed};
