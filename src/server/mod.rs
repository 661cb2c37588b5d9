mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;
pub use self::types::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::search_handler,
        api::images_handler,
        api::like_handler,
        api::unlike_handler,
        api::likes_handler,
        api::health_handler,
        api::rebuild_handler,
    ),
    components(schemas(
        SearchQuery,
        SearchResponse,
        ImageResult,
        ImagesResponse,
        ImageInfo,
        LikeImageRequest,
        StatusResponse,
        LikesResponse,
        HealthResponse,
        RebuildResponse,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(api::search_handler))
        .route("/images", get(api::images_handler))
        .route("/like", post(api::like_handler))
        .route("/unlike", post(api::unlike_handler))
        .route("/user/{wallet}/likes", get(api::likes_handler))
        .route("/health", get(api::health_handler))
        .route("/rebuild", post(api::rebuild_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 请求体限制：1M
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}
