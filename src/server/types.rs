use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::{Health, SearchHit, SearchResult};
use crate::store::ImageRecord;

fn default_num_results() -> usize {
    15
}

/// 搜索请求参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchQuery {
    /// 查询文本，为空时根据用户偏好搜索或返回随机结果
    #[serde(default)]
    pub text: String,
    /// 返回的结果数量
    #[serde(default = "default_num_results")]
    #[schema(default = 15)]
    pub num_results: usize,
    /// 钱包地址，提供时会混合该用户的偏好
    pub wallet_address: Option<String>,
    /// 随机结果使用的种子
    pub random_seed: Option<u64>,
}

/// 单条搜索结果
#[derive(Debug, Serialize, ToSchema)]
pub struct ImageResult {
    pub filename: String,
    pub hash: String,
    pub similarity: f32,
    pub extension: String,
}

impl From<SearchHit> for ImageResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            filename: hit.record.id.clone(),
            hash: hit.record.id,
            similarity: hit.similarity,
            extension: hit.record.extension,
        }
    }
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<ImageResult>,
    pub total: usize,
    /// 返回随机结果时实际使用的种子
    pub random_seed: Option<u64>,
}

impl From<SearchResult> for SearchResponse {
    fn from(r: SearchResult) -> Self {
        Self {
            total: r.total,
            results: r.results.into_iter().map(Into::into).collect(),
            random_seed: r.seed,
        }
    }
}

/// 图片元数据
#[derive(Debug, Serialize, ToSchema)]
pub struct ImageInfo {
    pub path: String,
    pub filename: String,
    pub extension: String,
    pub hash: String,
}

impl From<ImageRecord> for ImageInfo {
    fn from(r: ImageRecord) -> Self {
        Self {
            path: r.path.to_string_lossy().to_string(),
            filename: r.id.clone(),
            extension: r.extension,
            hash: r.id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImagesResponse {
    pub total: usize,
    pub images: Vec<ImageInfo>,
}

/// 喜欢或取消喜欢的请求参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct LikeImageRequest {
    pub wallet_address: String,
    pub image_hash: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: &str) -> Self {
        Self { status: "success".to_string(), message: message.to_string() }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LikesResponse {
    pub liked_images: Vec<String>,
}

/// 服务状态
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` 或 `degraded`
    pub status: String,
    pub indexed_images: usize,
    /// 当前使用的索引类型
    pub index_type: Option<String>,
}

impl From<Health> for HealthResponse {
    fn from(h: Health) -> Self {
        Self {
            status: if h.ready { "healthy" } else { "degraded" }.to_string(),
            indexed_images: h.indexed_images,
            index_type: h.index_type.map(|k| k.to_string()),
        }
    }
}

/// 重建索引的结果
#[derive(Debug, Serialize, ToSchema)]
pub struct RebuildResponse {
    /// 成功导入的图片数量
    pub succeeded: usize,
    /// 跳过的图片数量
    pub skipped: usize,
    /// 导入失败的图片 ID
    pub failed: Vec<String>,
    pub index_type: Option<String>,
}
