use thiserror::Error;

/// Errors produced when constructing entity values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{kind} id must not be empty")]
    EmptyId { kind: &'static str },
}
