//! Memo store adapter for inforest.
//!
//! Memos are keyed by `(user, tree)` and hold free-text content with a
//! version counter. The memo store has no transactional relationship with
//! the hierarchy store or even between its own calls.
//!
//! All backends implement the [`MemoStore`] trait:
//!
//! - [`InMemoryMemoStore`]: `HashMap`-based store for tests and embedding

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{MemoError, MemoResult};
pub use memory::InMemoryMemoStore;
pub use traits::MemoStore;
