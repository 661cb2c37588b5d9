use std::sync::Arc;

use crate::engine::SearchEngine;

/// 应用状态
pub struct AppState {
    /// 检索服务
    pub engine: SearchEngine,
    /// 重建索引使用的鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(engine: SearchEngine, token: String) -> Arc<Self> {
        Arc::new(AppState { engine, token })
    }
}
