//! HTTP server for inforest.
//!
//! Exposes the coordinator as JSON-over-HTTP RPCs under `/v1/forest/*`,
//! resolving the caller from a signed bearer token and bounding every
//! request by the configured timeout.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{AuthProvider, Credentials, SignedTokenAuth};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::InforestServer;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use inforest_hierarchy::InMemoryHierarchyStore;
    use inforest_memo::{InMemoryMemoStore, MemoError, MemoResult, MemoStore};
    use inforest_types::wire::{CreateTreeResponse, ErrorResponse, ForestMsg, MemoMsg, TreeMsg};
    use inforest_types::{Memo, MemoSeed, TreeId, UserId};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    const SECRET: &str = "router-test-secret";

    fn config() -> ServerConfig {
        ServerConfig {
            auth_secret: Some(SECRET.into()),
            ..ServerConfig::default()
        }
    }

    fn app() -> Router {
        InforestServer::in_memory(config()).unwrap().router()
    }

    /// Memo store whose deletes and creates can be made to fail per tree.
    struct FlakyMemos {
        inner: InMemoryMemoStore,
        fail_delete: Mutex<HashSet<String>>,
        fail_create: Mutex<HashSet<String>>,
    }

    impl FlakyMemos {
        fn new() -> Self {
            Self {
                inner: InMemoryMemoStore::new(),
                fail_delete: Mutex::new(HashSet::new()),
                fail_create: Mutex::new(HashSet::new()),
            }
        }
    }

    #[async_trait]
    impl MemoStore for FlakyMemos {
        async fn create_memo(&self, user: &UserId, tree: &TreeId, seed: MemoSeed) -> MemoResult<Memo> {
            let fail = self.fail_create.lock().unwrap().contains(tree.as_str());
            if fail {
                return Err(MemoError::Unavailable("memo create refused".into()));
            }
            self.inner.create_memo(user, tree, seed).await
        }

        async fn get_memo(&self, user: &UserId, tree: &TreeId) -> MemoResult<Memo> {
            self.inner.get_memo(user, tree).await
        }

        async fn update_memo(&self, user: &UserId, tree: &TreeId, content: String) -> MemoResult<Memo> {
            self.inner.update_memo(user, tree, content).await
        }

        async fn delete_memo(&self, user: &UserId, tree: &TreeId) -> MemoResult<Memo> {
            let fail = self.fail_delete.lock().unwrap().contains(tree.as_str());
            if fail {
                return Err(MemoError::Unavailable("memo delete refused".into()));
            }
            self.inner.delete_memo(user, tree).await
        }
    }

    fn flaky_app() -> (Router, Arc<FlakyMemos>) {
        let memos = Arc::new(FlakyMemos::new());
        let server = InforestServer::new(
            config(),
            Arc::new(InMemoryHierarchyStore::new()),
            Arc::clone(&memos) as Arc<dyn MemoStore>,
        )
        .unwrap();
        (server.router(), memos)
    }

    async fn alpha_with_subtree(app: &Router, token: &str) {
        create_alpha(app, token).await;
        for (parent, id) in [("root-1", "t2"), ("t2", "t3")] {
            let (status, _) = call(app, "CreateTree", Some(token), json!({ "parent_id": parent, "id": id, "name": id })).await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    fn token(user: &str) -> String {
        SignedTokenAuth::new(SECRET).mint(&UserId::new(user).unwrap())
    }

    async fn call(app: &Router, method: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method("POST")
            .uri(format!("/v1/forest/{method}"))
            .header("content-type", "application/json");
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let response = app
            .clone()
            .oneshot(req.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn create_alpha(app: &Router, token: &str) -> ForestMsg {
        let (status, body) = call(
            app,
            "CreateForest",
            Some(token),
            json!({
                "name": "Alpha",
                "description": "first",
                "root": { "id": "root-1", "name": "Root", "url": "http://root" }
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app()
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn info_endpoint() {
        let response = app()
            .oneshot(Request::builder().uri("/v1/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn create_forest_then_list() {
        let app = app();
        let u1 = token("U1");
        let forest = create_alpha(&app, &u1).await;
        assert_eq!(forest.root.as_ref().unwrap().id, "root-1");
        assert_eq!(forest.user_id, "U1");

        let (status, body) = call(&app, "GetForestsByUser", Some(&u1), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forests"][0]["id"], forest.id);

        let (_, body) = call(&app, "GetForestsByUser", Some(&token("U2")), json!({})).await;
        assert_eq!(body["forests"], json!([]));
    }

    #[tokio::test]
    async fn create_tree_and_memo_round() {
        let app = app();
        let u1 = token("U1");
        create_alpha(&app, &u1).await;

        let (status, body) = call(
            &app,
            "CreateTree",
            Some(&u1),
            json!({ "parent_id": "root-1", "id": "t2", "name": "Notes", "url": "http://x" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let created: CreateTreeResponse = serde_json::from_value(body).unwrap();
        assert_eq!(created.tree.id, "t2");
        assert_eq!(created.memo.version, 0);
        assert!(created.memo.content.is_none());

        let (status, body) = call(&app, "UpdateMemo", Some(&u1), json!({ "tree_id": "t2", "content": "hi" })).await;
        assert_eq!(status, StatusCode::OK);
        let memo: MemoMsg = serde_json::from_value(body).unwrap();
        assert_eq!(memo.version, 1);

        let (status, body) = call(&app, "GetTree", None, json!({ "tree_id": "root-1", "include_children": true })).await;
        assert_eq!(status, StatusCode::OK);
        let tree: TreeMsg = serde_json::from_value(body).unwrap();
        assert_eq!(tree.children.len(), 1);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = app();
        let (status, body) = call(&app, "GetMemo", None, json!({ "tree_id": "root-1" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(err.code, "invalid_identity");

        let (status, _) = call(&app, "GetMemo", Some("U1.deadbeef"), json!({ "tree_id": "root-1" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_leaf_delete_is_conflict() {
        let app = app();
        let u1 = token("U1");
        create_alpha(&app, &u1).await;
        call(&app, "CreateTree", Some(&u1), json!({ "parent_id": "root-1", "id": "t2", "name": "a" })).await;
        call(&app, "CreateTree", Some(&u1), json!({ "parent_id": "t2", "id": "t3", "name": "b" })).await;

        let (status, body) = call(&app, "DeleteTree", Some(&u1), json!({ "tree_id": "t2" })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");
        assert_eq!(body["partial"], false);

        let (status, body) = call(&app, "DeleteTree", Some(&u1), json!({ "tree_id": "t2", "cascade": true })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let (status, _) = call(&app, "GetMemo", Some(&u1), json!({ "tree_id": "t3" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_forest_requires_owner() {
        let app = app();
        let u1 = token("U1");
        let forest = create_alpha(&app, &u1).await;

        let (status, body) = call(&app, "DeleteForest", Some(&token("U2")), json!({ "forest_id": forest.id })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "permission_denied");

        let (status, _) = call(&app, "DeleteForest", Some(&u1), json!({ "forest_id": forest.id })).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GetForest", None, json!({ "forest_id": forest.id })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_ids_are_bad_requests() {
        let app = app();
        let u1 = token("U1");
        let (status, body) = call(&app, "CreateForest", Some(&u1), json!({ "name": "NoRoot" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid");

        let (status, _) = call(&app, "GetTree", Some(&u1), json!({ "tree_id": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failed_cascade_reports_partial_state() {
        let (app, memos) = flaky_app();
        let u1 = token("U1");
        alpha_with_subtree(&app, &u1).await;
        memos.fail_delete.lock().unwrap().insert("t3".into());

        let (status, body) = call(&app, "DeleteTree", Some(&u1), json!({ "tree_id": "t2", "cascade": true })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(err.code, "internal");
        assert!(err.partial);
        assert!(!err.quarantine);

        let (status, _) = call(&app, "GetMemo", Some(&u1), json!({ "tree_id": "t2" })).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GetTree", None, json!({ "tree_id": "t2" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_restore_reports_quarantine() {
        let (app, memos) = flaky_app();
        let u1 = token("U1");
        alpha_with_subtree(&app, &u1).await;
        memos.fail_delete.lock().unwrap().insert("t3".into());
        memos.fail_create.lock().unwrap().insert("t2".into());

        let (status, body) = call(&app, "DeleteTree", Some(&u1), json!({ "tree_id": "t2", "cascade": true })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(err.code, "quarantine");
        assert!(err.partial);
        assert!(err.quarantine);
        assert!(err.message.contains("lost memos [t2]"));
    }

    #[tokio::test]
    async fn rolled_back_create_is_not_partial() {
        let (app, memos) = flaky_app();
        let u1 = token("U1");
        create_alpha(&app, &u1).await;
        memos.fail_create.lock().unwrap().insert("t2".into());

        let (status, body) = call(&app, "CreateTree", Some(&u1), json!({ "parent_id": "root-1", "id": "t2", "name": "a" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["partial"], false);
        assert_eq!(body["quarantine"], false);
        let (status, _) = call(&app, "GetTree", None, json!({ "tree_id": "t2" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_users_subtree_is_forbidden() {
        let app = app();
        let u1 = token("U1");
        alpha_with_subtree(&app, &u1).await;

        let (status, body) = call(&app, "DeleteTree", Some(&token("U2")), json!({ "tree_id": "t2", "cascade": true })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "permission_denied");
        let (status, _) = call(&app, "GetMemo", Some(&u1), json!({ "tree_id": "t3" })).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_json_gets_error_body() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/forest/GetTree")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let err: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err.code, "invalid");
        assert!(!err.partial);
    }
}
