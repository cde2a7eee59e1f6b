//! Error taxonomy for coordinator operations.
//!
//! Adapter errors are translated into one flat set of categories
//! ([`ErrorKind`]). Composite operations that fail after their first step
//! committed wrap the triggering error so the caller can tell a clean
//! rollback from a partially applied operation and from diverged stores.

use std::fmt;

use inforest_hierarchy::HierarchyError;
use inforest_memo::MemoError;
use inforest_types::TreeId;
use thiserror::Error;

use crate::saga::{Operation, Step};

/// Flat error category, stable across wrappers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidIdentity,
    NotFound,
    AlreadyExists,
    Conflict,
    Invalid,
    PermissionDenied,
    DeadlineExceeded,
    Internal,
    Quarantine,
}

impl ErrorKind {
    /// Machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentity => "invalid_identity",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::PermissionDenied => "permission_denied",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Internal => "internal",
            Self::Quarantine => "quarantine",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors returned by every coordinator operation.
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    #[error("caller identity is missing or unauthenticated")]
    InvalidIdentity,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("deadline exceeded during {0}")]
    DeadlineExceeded(Step),

    #[error("internal error: {0}")]
    Internal(String),

    /// The failed step was fully undone; nothing was left behind.
    #[error("{operation} failed at {step} and was rolled back: {source}")]
    RolledBack {
        operation: Operation,
        step: Step,
        source: Box<CoordinatorError>,
    },

    /// The structural delete committed, a memo deletion failed, and every
    /// memo deleted before it was restored. Trees are gone; memos listed in
    /// `restored` and `untouched` survive them.
    #[error(
        "{operation} on {subject} partially applied: failed at {step} after the structure was removed; {count} memo(s) restored: {source}",
        count = .restored.len()
    )]
    PartiallyApplied {
        operation: Operation,
        subject: String,
        step: Step,
        restored: Vec<TreeId>,
        untouched: Vec<TreeId>,
        source: Box<CoordinatorError>,
    },

    /// A compensation call failed. The stores diverged and need manual
    /// reconciliation; retrying blindly is not safe.
    #[error("{0}")]
    Quarantine(Box<QuarantineReport>),
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentity => ErrorKind::InvalidIdentity,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Self::Internal(_) => ErrorKind::Internal,
            Self::RolledBack { source, .. } | Self::PartiallyApplied { source, .. } => source.kind(),
            Self::Quarantine(_) => ErrorKind::Quarantine,
        }
    }

    /// The error that triggered the failure, with wrappers peeled off.
    pub fn root_cause(&self) -> &CoordinatorError {
        match self {
            Self::RolledBack { source, .. } | Self::PartiallyApplied { source, .. } => {
                source.root_cause()
            }
            Self::Quarantine(report) => report.trigger.root_cause(),
            other => other,
        }
    }

    /// Whether the failed operation left some state behind.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartiallyApplied { .. } | Self::Quarantine(_))
    }

    pub fn is_quarantine(&self) -> bool {
        matches!(self, Self::Quarantine(_))
    }

    pub fn quarantine_report(&self) -> Option<&QuarantineReport> {
        match self {
            Self::Quarantine(report) => Some(report),
            _ => None,
        }
    }
}

impl From<HierarchyError> for CoordinatorError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::NotFound { .. } => Self::NotFound(err.to_string()),
            HierarchyError::AlreadyExists { .. } => Self::AlreadyExists(err.to_string()),
            HierarchyError::Invalid(msg) => Self::Invalid(msg),
            HierarchyError::HasChildren { .. } | HierarchyError::RootOfForest { .. } => {
                Self::Conflict(err.to_string())
            }
            HierarchyError::Unavailable(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<MemoError> for CoordinatorError {
    fn from(err: MemoError) -> Self {
        match err {
            MemoError::NotFound { .. } => Self::NotFound(err.to_string()),
            MemoError::AlreadyExists { .. } => Self::AlreadyExists(err.to_string()),
            MemoError::Unavailable(_) => Self::Internal(err.to_string()),
        }
    }
}

/// One compensation call that did not succeed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompensationFailure {
    pub step: Step,
    pub tree_id: Option<TreeId>,
    pub error: String,
}

/// Everything an operator needs to reconcile diverged stores by hand.
#[derive(Clone, Debug)]
pub struct QuarantineReport {
    pub operation: Operation,
    /// Forest or tree id the operation targeted.
    pub subject: String,
    /// Forward step whose failure started compensation.
    pub failed_step: Step,
    /// The error that started compensation.
    pub trigger: Box<CoordinatorError>,
    pub failures: Vec<CompensationFailure>,
    /// Tree nodes left in the hierarchy without a memo.
    pub orphaned_trees: Vec<TreeId>,
    /// Memos deleted during the operation and recreated.
    pub restored_memos: Vec<TreeId>,
    /// Memos deleted during the operation that could not be recreated.
    pub lost_memos: Vec<TreeId>,
    /// Memos that outlive their removed trees: never reached by a delete
    /// loop, or not discarded after a timed-out create.
    pub stale_memos: Vec<TreeId>,
}

impl QuarantineReport {
    pub(crate) fn new(operation: Operation, subject: impl Into<String>, failed_step: Step, trigger: CoordinatorError) -> Self {
        Self {
            operation,
            subject: subject.into(),
            failed_step,
            trigger: Box::new(trigger),
            failures: Vec::new(),
            orphaned_trees: Vec::new(),
            restored_memos: Vec::new(),
            lost_memos: Vec::new(),
            stale_memos: Vec::new(),
        }
    }

    /// Report for a post-commit phase that died without returning.
    pub(crate) fn aborted(operation: Operation, subject: String, reason: String) -> Self {
        Self::new(
            operation,
            subject,
            Step::RemoveStructure,
            CoordinatorError::Internal(format!("post-commit phase aborted: {reason}")),
        )
    }
}

fn join_ids(ids: &[TreeId]) -> String {
    ids.iter().map(TreeId::as_str).collect::<Vec<_>>().join(",")
}

impl fmt::Display for QuarantineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quarantine: {} on {} failed at {} ({})",
            self.operation, self.subject, self.failed_step, self.trigger
        )?;
        for failure in &self.failures {
            match &failure.tree_id {
                Some(id) => write!(f, "; {} failed for {}: {}", failure.step, id, failure.error)?,
                None => write!(f, "; {} failed: {}", failure.step, failure.error)?,
            }
        }
        if !self.orphaned_trees.is_empty() {
            write!(f, "; orphaned trees [{}]", join_ids(&self.orphaned_trees))?;
        }
        if !self.lost_memos.is_empty() {
            write!(f, "; lost memos [{}]", join_ids(&self.lost_memos))?;
        }
        if !self.stale_memos.is_empty() {
            write!(f, "; stale memos [{}]", join_ids(&self.stale_memos))?;
        }
        Ok(())
    }
}

/// Result alias for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
