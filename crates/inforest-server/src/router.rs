use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, SharedState};

/// Build the axum router with every inforest endpoint.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/forest/GetForestsByUser", post(handler::get_forests_by_user))
        .route("/v1/forest/CreateForest", post(handler::create_forest))
        .route("/v1/forest/GetForest", post(handler::get_forest))
        .route("/v1/forest/UpdateForest", post(handler::update_forest))
        .route("/v1/forest/DeleteForest", post(handler::delete_forest))
        .route("/v1/forest/CreateTree", post(handler::create_tree))
        .route("/v1/forest/GetTree", post(handler::get_tree))
        .route("/v1/forest/UpdateTree", post(handler::update_tree))
        .route("/v1/forest/DeleteTree", post(handler::delete_tree))
        .route("/v1/forest/GetMemo", post(handler::get_memo))
        .route("/v1/forest/UpdateMemo", post(handler::update_memo))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
