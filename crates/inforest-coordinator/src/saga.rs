//! Step and stage bookkeeping for composite operations.
//!
//! Every composite operation walks the same state machine:
//!
//! ```text
//! Pending -> StructureCommitted -> Completed
//!                               \-> Compensating -> Compensated
//!                                                \-> CompensationFailed
//! ```
//!
//! [`Saga`] records the transitions and logs each one. It holds no store
//! handles; the coordinator drives the actual calls.

use std::fmt;
use std::future::Future;

use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{CoordinatorError, CoordinatorResult, QuarantineReport};

/// The composite operations the coordinator exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateForest,
    CreateTree,
    DeleteForest,
    DeleteTree,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateForest => f.write_str("create-forest"),
            Self::CreateTree => f.write_str("create-tree"),
            Self::DeleteForest => f.write_str("delete-forest"),
            Self::DeleteTree => f.write_str("delete-tree"),
        }
    }
}

/// A single adapter call within a composite or pass-through operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// Read needed before a mutation (e.g. ownership lookup).
    Lookup,
    StructuralCreate,
    StructuralDelete,
    StructuralUpdate,
    MemoCreate,
    MemoRead,
    MemoUpdate,
    MemoDelete,
    /// Undo of a structural create.
    RemoveStructure,
    /// Undo of a memo create whose outcome is unknown (it timed out).
    DiscardMemo,
    /// Recreation of memos deleted earlier in the same operation.
    RestoreMemos,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lookup => "lookup",
            Self::StructuralCreate => "structural-create",
            Self::StructuralDelete => "structural-delete",
            Self::StructuralUpdate => "structural-update",
            Self::MemoCreate => "memo-create",
            Self::MemoRead => "memo-read",
            Self::MemoUpdate => "memo-update",
            Self::MemoDelete => "memo-delete",
            Self::RemoveStructure => "remove-structure",
            Self::DiscardMemo => "discard-memo",
            Self::RestoreMemos => "restore-memos",
        };
        f.write_str(s)
    }
}

/// Where a composite operation currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SagaStage {
    Pending,
    StructureCommitted,
    Completed,
    Compensating,
    Compensated,
    CompensationFailed,
}

impl fmt::Display for SagaStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::StructureCommitted => "structure-committed",
            Self::Completed => "completed",
            Self::Compensating => "compensating",
            Self::Compensated => "compensated",
            Self::CompensationFailed => "compensation-failed",
        };
        f.write_str(s)
    }
}

/// Transition log for one composite operation.
#[derive(Clone, Debug)]
pub struct Saga {
    pub operation: Operation,
    /// Forest or tree id the operation targets.
    pub subject: String,
    pub request_id: Uuid,
    stage: SagaStage,
    started: Instant,
}

impl Saga {
    pub fn begin(operation: Operation, subject: impl Into<String>, request_id: Uuid) -> Self {
        let saga = Self {
            operation,
            subject: subject.into(),
            request_id,
            stage: SagaStage::Pending,
            started: Instant::now(),
        };
        debug!(
            operation = %saga.operation,
            subject = %saga.subject,
            request_id = %saga.request_id,
            "composite operation started"
        );
        saga
    }

    pub fn advance(&mut self, next: SagaStage) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match next {
            SagaStage::Compensating => warn!(
                operation = %self.operation,
                subject = %self.subject,
                request_id = %self.request_id,
                from = %self.stage,
                elapsed_ms,
                "compensating after partial failure"
            ),
            SagaStage::CompensationFailed => error!(
                operation = %self.operation,
                subject = %self.subject,
                request_id = %self.request_id,
                elapsed_ms,
                "compensation failed; stores diverged"
            ),
            _ => debug!(
                operation = %self.operation,
                subject = %self.subject,
                request_id = %self.request_id,
                from = %self.stage,
                to = %next,
                elapsed_ms,
                "composite operation advanced"
            ),
        }
        self.stage = next;
    }
}

/// Await `fut` if a deadline is set, failing with `DeadlineExceeded(step)`
/// once it passes.
pub(crate) async fn bounded<T, E, F>(
    deadline: Option<Instant>,
    step: Step,
    fut: F,
) -> CoordinatorResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<CoordinatorError>,
{
    match deadline {
        Some(at) => match tokio::time::timeout_at(at, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(CoordinatorError::DeadlineExceeded(step)),
        },
        None => fut.await.map_err(Into::into),
    }
}

/// A forward step that committed, and whether it answered in time.
pub(crate) enum Attempt<T> {
    OnTime(T),
    /// The deadline passed before the call answered, but it committed.
    Late(T),
}

/// Await `fut` against `deadline` without cancelling it on expiry.
///
/// A store call that times out may still commit, so it is driven to
/// completion. A late success comes back as [`Attempt::Late`] for the
/// caller to deal with; a late failure changed nothing and is reported as
/// `DeadlineExceeded(step)`.
pub(crate) async fn attempt<T, E, F>(
    deadline: Option<Instant>,
    step: Step,
    fut: F,
) -> CoordinatorResult<Attempt<T>>
where
    F: Future<Output = Result<T, E>>,
    E: Into<CoordinatorError>,
{
    tokio::pin!(fut);
    let Some(at) = deadline else {
        return fut.await.map(Attempt::OnTime).map_err(Into::into);
    };
    match tokio::time::timeout_at(at, &mut fut).await {
        Ok(result) => result.map(Attempt::OnTime).map_err(Into::into),
        Err(_) => match fut.await {
            Ok(value) => {
                warn!(%step, "call committed after the deadline");
                Ok(Attempt::Late(value))
            }
            Err(err) => {
                let err: CoordinatorError = err.into();
                debug!(%step, error = %err, "call failed after the deadline");
                Err(CoordinatorError::DeadlineExceeded(step))
            }
        },
    }
}

/// Run the post-commit phase of a composite operation on its own task.
///
/// The caller awaits the result, but dropping the caller does not cancel
/// the task. A panic inside the phase leaves the stores in an unknown
/// state and is reported as quarantine.
pub(crate) async fn settle<T, F>(operation: Operation, subject: String, phase: F) -> CoordinatorResult<T>
where
    T: Send + 'static,
    F: Future<Output = CoordinatorResult<T>> + Send + 'static,
{
    match tokio::spawn(phase).await {
        Ok(result) => result,
        Err(join) => {
            error!(%operation, %subject, error = %join, "post-commit phase aborted");
            Err(CoordinatorError::Quarantine(Box::new(QuarantineReport::aborted(
                operation,
                subject,
                join.to_string(),
            ))))
        }
    }
}
