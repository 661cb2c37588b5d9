use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils;

/// 默认的嵌入向量维数
pub const DEFAULT_DIM: usize = 512;

/// 图片记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    /// 图片 ID，取自不带后缀的文件名
    pub id: String,
    /// 文件后缀，包含 `.`
    pub extension: String,
    /// 图片路径
    pub path: PathBuf,
    /// 在存储和索引中的位置，插入时分配且不会复用
    pub position: usize,
}

impl ImageRecord {
    /// 根据文件路径生成记录，位置在插入时才会分配
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let id = path.file_stem()?.to_string_lossy().to_string();
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        Some(Self { id, extension, path: path.to_path_buf(), position: 0 })
    }
}

/// 按插入顺序保存图片记录与对应的单位向量
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    dim: usize,
    records: Vec<ImageRecord>,
    /// 展平的 n * dim 向量
    vectors: Vec<f32>,
    positions: HashMap<String, usize>,
}

impl EmbeddingStore {
    pub fn new(dim: usize) -> Self {
        Self { dim, records: vec![], vectors: vec![], positions: HashMap::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 追加一条记录，返回分配的位置
    ///
    /// 向量会被归一化后再保存，所以存储内的向量始终为单位向量
    pub fn insert(&mut self, mut record: ImageRecord, mut vector: Vec<f32>) -> Result<usize> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        if self.positions.contains_key(&record.id) {
            return Err(Error::DuplicateId(record.id));
        }
        utils::normalize(&mut vector)?;

        let position = self.records.len();
        record.position = position;
        self.positions.insert(record.id.clone(), position);
        self.records.push(record);
        self.vectors.extend_from_slice(&vector);

        debug_assert_eq!(self.vectors.len(), self.records.len() * self.dim);
        Ok(position)
    }

    pub fn get(&self, position: usize) -> Result<(&ImageRecord, &[f32])> {
        match self.records.get(position) {
            Some(record) => Ok((record, self.vector(position))),
            None => Err(Error::OutOfRange { position, size: self.len() }),
        }
    }

    pub fn find_by_id(&self, id: &str) -> Result<usize> {
        self.positions.get(id).copied().ok_or_else(|| Error::NotFound(id.to_owned()))
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    /// 所有向量，展平为 n * dim
    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// 以 `batch_size` 条为一批遍历 `(起始位置, 展平向量)`
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = (usize, &[f32])> {
        let batch_size = batch_size.max(1);
        self.vectors
            .chunks(batch_size * self.dim)
            .enumerate()
            .map(move |(i, chunk)| (i * batch_size, chunk))
    }

    fn vector(&self, position: usize) -> &[f32] {
        &self.vectors[position * self.dim..(position + 1) * self.dim]
    }
}
