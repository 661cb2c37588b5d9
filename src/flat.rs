use crate::knn::{Neighbor, par_knn_inner_product};

/// 每个并行任务计算的向量数量
const SEARCH_CHUNK: usize = 4096;

/// 暴力扫描所有向量的精确索引
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    ids: Vec<u64>,
    codes: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, ids: vec![], codes: vec![] }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn ntotal(&self) -> usize {
        self.ids.len()
    }

    /// 批量添加向量，第 i 条向量的 ID 为 `start + i`
    pub fn add(&mut self, start: usize, data: &[f32]) {
        assert_eq!(data.len() % self.dim, 0, "data length must be a multiple of dim");
        let n = data.len() / self.dim;
        self.ids.extend((start..start + n).map(|id| id as u64));
        self.codes.extend_from_slice(data);
    }

    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        par_knn_inner_product(query, &self.ids, &self.codes, k, SEARCH_CHUNK)
    }
}
