//! Cross-store consistency coordinator for inforest.
//!
//! Forests and trees live in a hierarchy store; memos live in a separate
//! memo store. No transaction spans both. The [`Coordinator`] composes
//! multi-step operations over the two stores and compensates when a later
//! step fails after an earlier one committed.
//!
//! # Atomicity contract
//!
//! - `create_forest` / `create_tree`: on success both the tree node and its
//!   empty memo exist. On any error other than
//!   [`CoordinatorError::Quarantine`] the tree node is absent.
//! - `delete_forest` / `delete_tree`: the structural delete is never rolled
//!   back. If a memo deletion then fails, the memos already deleted are
//!   recreated with their exact content and version and the caller receives
//!   [`CoordinatorError::PartiallyApplied`]. If any recreation fails the
//!   caller receives [`CoordinatorError::Quarantine`].
//!
//! A composite operation runs on a spawned task from its first store call
//! on. Dropping the caller's future does not abandon cleanup halfway, and a
//! structural call that outlives the deadline is waited out so a late
//! commit is still undone (creates) or followed by the memo purge
//! (deletes).
//!
//! Tree mutations require the caller to own the tree's forest, so memos
//! are only created and purged under the forest owner.
//!
//! # Modules
//!
//! - [`context`]: [`RequestContext`] carrying the caller identity and deadline
//! - [`error`]: [`CoordinatorError`], [`ErrorKind`], [`QuarantineReport`]
//! - [`saga`]: step/stage bookkeeping for composite operations
//! - [`coordinator`]: the [`Coordinator`] itself

pub mod context;
pub mod coordinator;
pub mod error;
pub mod saga;

#[cfg(test)]
mod testing;

pub use context::{Identity, RequestContext};
pub use coordinator::{CascadeOutcome, Coordinator, CreatedTree};
pub use error::{CompensationFailure, CoordinatorError, CoordinatorResult, ErrorKind, QuarantineReport};
pub use saga::{Operation, Saga, SagaStage, Step};
