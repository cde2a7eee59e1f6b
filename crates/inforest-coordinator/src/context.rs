//! Per-call ambient state threaded into every coordinator operation.

use std::future::Future;
use std::time::Duration;

use inforest_types::UserId;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::saga::{self, Step};

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
}

impl Identity {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// Caller identity, deadline and correlation id for one request.
///
/// The transport layer builds one per inbound call. An anonymous context
/// is valid; operations that need a user fail with
/// [`CoordinatorError::InvalidIdentity`] before touching any store.
#[derive(Clone, Debug)]
pub struct RequestContext {
    identity: Option<Identity>,
    deadline: Option<Instant>,
    request_id: Uuid,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self {
            identity: None,
            deadline: None,
            request_id: Uuid::now_v7(),
        }
    }

    pub fn authenticated(user_id: UserId) -> Self {
        Self {
            identity: Some(Identity::new(user_id)),
            ..Self::anonymous()
        }
    }

    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The authenticated user, or `InvalidIdentity`.
    pub fn user(&self) -> CoordinatorResult<&UserId> {
        self.identity
            .as_ref()
            .map(|i| &i.user_id)
            .ok_or(CoordinatorError::InvalidIdentity)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Await an adapter call under this request's deadline.
    pub async fn bounded<T, E, F>(&self, step: Step, fut: F) -> CoordinatorResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<CoordinatorError>,
    {
        saga::bounded(self.deadline, step, fut).await
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_user() {
        let ctx = RequestContext::anonymous();
        assert!(matches!(ctx.user(), Err(CoordinatorError::InvalidIdentity)));
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn authenticated_exposes_user() {
        let ctx = RequestContext::authenticated(UserId::new("u1").unwrap());
        assert_eq!(ctx.user().unwrap().as_str(), "u1");
        assert_eq!(ctx.identity().unwrap().user_id.as_str(), "u1");
    }

    #[test]
    fn request_ids_differ() {
        let a = RequestContext::anonymous();
        let b = RequestContext::anonymous();
        assert_ne!(a.request_id(), b.request_id());
    }

    #[tokio::test]
    async fn timeout_sets_deadline() {
        let ctx = RequestContext::anonymous().with_timeout(Duration::from_secs(5));
        assert!(ctx.deadline().unwrap() > Instant::now());
        let value = ctx
            .bounded(Step::Lookup, async { Ok::<_, CoordinatorError>(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }
}
