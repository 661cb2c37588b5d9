use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 检索引擎的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 语料为空，无法构建索引
    #[error("语料为空，无法构建索引")]
    EmptyCorpus,

    /// 编码器处理单个条目失败
    #[error("编码失败 {path}: {reason}")]
    Encoder { path: PathBuf, reason: String },

    /// 尚未成功构建过索引
    #[error("索引尚未就绪")]
    IndexNotReady,

    #[error("向量维度不匹配：期望 {expected}，实际 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("位置越界：{position} >= {size}")]
    OutOfRange { position: usize, size: usize },

    #[error("图片不存在: {0}")]
    NotFound(String),

    /// 相同 ID 的图片已经存在（例如同名不同后缀）
    #[error("图片 ID 重复: {0}")]
    DuplicateId(String),

    /// 零向量无法归一化
    #[error("向量模长为零或包含非法值")]
    ZeroVector,

    #[error("偏好存储读写失败: {0}")]
    PreferenceStore(#[from] std::io::Error),

    #[error("偏好数据格式错误: {0}")]
    PreferenceFormat(#[from] serde_json::Error),

    /// 锁被污染，说明另一个线程在持锁期间 panic
    #[error("锁被污染")]
    LockPoisoned,
}

impl Error {
    pub(crate) fn encoder(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Encoder { path: path.into(), reason: reason.to_string() }
    }
}
