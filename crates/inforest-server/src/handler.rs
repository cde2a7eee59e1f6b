use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::HeaderMap;
use axum::response::Json;
use inforest_coordinator::{Coordinator, RequestContext};
use inforest_hierarchy::HierarchyStore;
use inforest_memo::MemoStore;
use inforest_types::wire::{
    CreateForestRequest, CreateTreeRequest, CreateTreeResponse, DeleteForestRequest,
    DeleteForestResponse, DeleteTreeRequest, DeleteTreeResponse, ForestMsg, GetForestRequest,
    GetForestResponse, GetForestsByUserRequest, GetForestsByUserResponse, GetMemoRequest,
    GetTreeRequest, MemoMsg, TreeMsg, UpdateForestRequest, UpdateMemoRequest, UpdateTreeRequest,
};
use inforest_types::{ForestId, ForestPatch, NewTree, TreeId, TreePatch};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{AuthProvider, Credentials};
use crate::error::{ServerError, ServerResult};

pub type DynCoordinator = Coordinator<dyn HierarchyStore, dyn MemoStore>;

/// Shared state behind every handler.
pub struct AppState {
    pub coordinator: DynCoordinator,
    pub auth: Arc<dyn AuthProvider>,
    pub request_timeout: Duration,
}

pub type SharedState = Arc<AppState>;

const REQUEST_ID_HEADER: &str = "x-request-id";

impl AppState {
    /// Build the coordinator context for one inbound request.
    async fn context(&self, headers: &HeaderMap) -> RequestContext {
        let identity = self.auth.authenticate(&Credentials::from_headers(headers)).await;
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or_else(Uuid::now_v7);
        RequestContext::anonymous()
            .with_identity(identity)
            .with_timeout(self.request_timeout)
            .with_request_id(request_id)
    }
}

/// JSON request body. Malformed bodies are answered with an
/// `ErrorResponse` instead of axum's plain-text rejection.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "inforest-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn get_forests_by_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<GetForestsByUserRequest>,
) -> ServerResult<Json<GetForestsByUserResponse>> {
    let ctx = state.context(&headers).await;
    let forests = state
        .coordinator
        .get_forests_by_user(&ctx, req.include_children)
        .await?;
    Ok(Json(GetForestsByUserResponse {
        forests: forests.iter().map(ForestMsg::from).collect(),
    }))
}

pub async fn create_forest(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateForestRequest>,
) -> ServerResult<Json<ForestMsg>> {
    let ctx = state.context(&headers).await;
    let root = req
        .root
        .ok_or_else(|| ServerError::BadRequest("root is required".into()))?;
    let root = NewTree::try_from(root)?;
    let forest = state
        .coordinator
        .create_forest(&ctx, req.name, req.description, root)
        .await?;
    Ok(Json(ForestMsg::from(&forest)))
}

pub async fn get_forest(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<GetForestRequest>,
) -> ServerResult<Json<GetForestResponse>> {
    let ctx = state.context(&headers).await;
    let id = ForestId::new(req.forest_id)?;
    let forest = state
        .coordinator
        .get_forest(&ctx, &id, req.include_children)
        .await?;
    Ok(Json(GetForestResponse {
        forest: ForestMsg::from(&forest),
    }))
}

pub async fn update_forest(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdateForestRequest>,
) -> ServerResult<Json<ForestMsg>> {
    let ctx = state.context(&headers).await;
    let patch = ForestPatch::try_from(req)?;
    let forest = state.coordinator.update_forest(&ctx, patch).await?;
    Ok(Json(ForestMsg::from(&forest)))
}

pub async fn delete_forest(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<DeleteForestRequest>,
) -> ServerResult<Json<DeleteForestResponse>> {
    let ctx = state.context(&headers).await;
    let id = ForestId::new(req.forest_id)?;
    state.coordinator.delete_forest(&ctx, &id).await?;
    Ok(Json(DeleteForestResponse { success: true }))
}

pub async fn create_tree(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateTreeRequest>,
) -> ServerResult<Json<CreateTreeResponse>> {
    let ctx = state.context(&headers).await;
    let parent = TreeId::new(req.parent_id)?;
    let tree = NewTree::new(TreeId::new(req.id)?, req.name, req.url);
    let created = state.coordinator.create_tree(&ctx, &parent, tree).await?;
    Ok(Json(CreateTreeResponse {
        tree: TreeMsg::from(&created.tree),
        memo: MemoMsg::from(&created.memo),
    }))
}

pub async fn get_tree(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<GetTreeRequest>,
) -> ServerResult<Json<TreeMsg>> {
    let ctx = state.context(&headers).await;
    let id = TreeId::new(req.tree_id)?;
    let tree = state
        .coordinator
        .get_tree(&ctx, &id, req.include_children)
        .await?;
    Ok(Json(TreeMsg::from(&tree)))
}

pub async fn update_tree(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdateTreeRequest>,
) -> ServerResult<Json<TreeMsg>> {
    let ctx = state.context(&headers).await;
    let patch = TreePatch::try_from(req)?;
    let tree = state.coordinator.update_tree(&ctx, patch).await?;
    Ok(Json(TreeMsg::from(&tree)))
}

pub async fn delete_tree(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<DeleteTreeRequest>,
) -> ServerResult<Json<DeleteTreeResponse>> {
    let ctx = state.context(&headers).await;
    let id = TreeId::new(req.tree_id)?;
    state.coordinator.delete_tree(&ctx, &id, req.cascade).await?;
    Ok(Json(DeleteTreeResponse { success: true }))
}

pub async fn get_memo(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<GetMemoRequest>,
) -> ServerResult<Json<MemoMsg>> {
    let ctx = state.context(&headers).await;
    let id = TreeId::new(req.tree_id)?;
    let memo = state.coordinator.get_memo(&ctx, &id).await?;
    Ok(Json(MemoMsg::from(&memo)))
}

pub async fn update_memo(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdateMemoRequest>,
) -> ServerResult<Json<MemoMsg>> {
    let ctx = state.context(&headers).await;
    let id = TreeId::new(req.tree_id)?;
    let memo = state.coordinator.update_memo(&ctx, &id, req.content).await?;
    Ok(Json(MemoMsg::from(&memo)))
}
