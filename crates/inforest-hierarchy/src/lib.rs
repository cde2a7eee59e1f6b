//! Hierarchy store adapter for inforest.
//!
//! The hierarchy store owns the structure of every forest: the forest
//! record, its root tree, and the parent-child edges between trees. It knows
//! nothing about memos.
//!
//! # Architecture
//!
//! - Every structural call is atomic with respect to the store itself. A
//!   reader never observes a half-created forest or a partially removed
//!   subtree.
//! - Tree ids are unique across the whole store, not only within a forest.
//! - Deletes report the complete list of removed tree ids in pre-order so
//!   callers can clean up dependent data in other stores.
//!
//! # Modules
//!
//! - [`error`]: [`HierarchyError`] and the [`EntityKind`] it names
//! - [`traits`]: The [`HierarchyStore`] trait defining the storage interface
//! - [`memory`]: In-memory [`InMemoryHierarchyStore`]

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{EntityKind, HierarchyError, HierarchyResult};
pub use memory::InMemoryHierarchyStore;
pub use traits::HierarchyStore;
