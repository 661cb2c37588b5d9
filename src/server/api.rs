use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_auth::AuthBearer;
use log::{info, warn};
use tokio::task::block_in_place;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::engine::SearchRequest;
use crate::metrics;

/// 按文本搜索图片，可混合用户偏好
///
/// 文本为空且用户没有喜欢的图片时返回随机结果，同时返回使用的种子
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchQuery,
    responses(
        (status = 200, body = SearchResponse),
        (status = 503, description = "索引尚未就绪"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(query): Json<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let req = SearchRequest {
        text: query.text,
        num_results: query.num_results,
        wallet: query.wallet_address.filter(|w| !w.is_empty()),
        seed: query.random_seed,
    };
    let result = block_in_place(|| state.engine.search(&req))?;
    Ok(Json(result.into()))
}

/// 列出所有已索引的图片
#[utoipa::path(
    get,
    path = "/images",
    responses(
        (status = 200, body = ImagesResponse),
    )
)]
pub async fn images_handler(State(state): State<Arc<AppState>>) -> Result<Json<ImagesResponse>> {
    let images = state.engine.list_images()?;
    Ok(Json(ImagesResponse {
        total: images.len(),
        images: images.into_iter().map(Into::into).collect(),
    }))
}

/// 将图片加入用户喜欢的列表
#[utoipa::path(
    post,
    path = "/like",
    request_body = LikeImageRequest,
    responses(
        (status = 200, body = StatusResponse),
    )
)]
pub async fn like_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<LikeImageRequest>,
) -> Result<Json<StatusResponse>> {
    block_in_place(|| state.engine.like(&data.wallet_address, &data.image_hash))?;
    Ok(Json(StatusResponse::success("Image liked")))
}

/// 将图片从用户喜欢的列表中移除
#[utoipa::path(
    post,
    path = "/unlike",
    request_body = LikeImageRequest,
    responses(
        (status = 200, body = StatusResponse),
    )
)]
pub async fn unlike_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<LikeImageRequest>,
) -> Result<Json<StatusResponse>> {
    block_in_place(|| state.engine.unlike(&data.wallet_address, &data.image_hash))?;
    Ok(Json(StatusResponse::success("Image unliked")))
}

/// 获取用户喜欢的图片
#[utoipa::path(
    get,
    path = "/user/{wallet}/likes",
    params(("wallet" = String, Path, description = "钱包地址")),
    responses(
        (status = 200, body = LikesResponse),
    )
)]
pub async fn likes_handler(
    State(state): State<Arc<AppState>>,
    Path(wallet): Path<String>,
) -> Result<Json<LikesResponse>> {
    let liked = state.engine.likes(&wallet)?;
    Ok(Json(LikesResponse { liked_images: liked.into_iter().collect() }))
}

/// 服务状态
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>> {
    Ok(Json(state.engine.health()?.into()))
}

/// 重新扫描图片目录并重建索引，需要鉴权
#[utoipa::path(
    post,
    path = "/rebuild",
    responses(
        (status = 200, body = RebuildResponse),
        (status = 401, description = "token 无效"),
    ),
    security(("bearer" = []))
)]
pub async fn rebuild_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Response> {
    if token != state.token {
        warn!("重建索引请求的 token 无效");
        return Ok((StatusCode::UNAUTHORIZED, "invalid token").into_response());
    }

    info!("收到重建索引请求");
    let report = block_in_place(|| state.engine.rebuild())?;
    let health = state.engine.health()?;
    Ok(Json(RebuildResponse {
        succeeded: report.succeeded,
        skipped: report.skipped(),
        failed: report.failures.into_iter().map(|f| f.id).collect(),
        index_type: health.index_type.map(|k| k.to_string()),
    })
    .into_response())
}

/// prometheus 指标
pub async fn metrics_handler() -> String {
    metrics::gather_text()
}
