use rayon::prelude::*;

use crate::kmeans::train_centroids;
use crate::utils::dot;

/// 将向量分配到聚类中心的量化器
pub trait Quantizer {
    /// 聚类中心数量
    fn nlist(&self) -> usize;

    /// 向量维数
    fn dim(&self) -> usize;

    /// 为多组向量搜索最接近的 k 个聚类中心，返回每组向量对应的中心编号列表
    ///
    /// x 为展平的 n * dim 数组
    fn search(&self, x: &[f32], k: usize) -> Vec<Vec<usize>>;
}

/// 暴力计算内积的量化器
#[derive(Debug, Clone)]
pub struct FlatQuantizer {
    dim: usize,
    centroids: Vec<f32>,
}

impl FlatQuantizer {
    pub fn new(dim: usize, centroids: Vec<f32>) -> Self {
        assert_eq!(centroids.len() % dim, 0, "centroids length must be a multiple of dim");
        Self { dim, centroids }
    }

    /// 使用训练集训练 nlist 个聚类中心
    pub fn train(x: &[f32], dim: usize, nlist: usize, max_iter: usize) -> Self {
        Self::new(dim, train_centroids(x, dim, nlist, max_iter, true))
    }

    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    fn assign(&self, xq: &[f32], k: usize) -> Vec<usize> {
        let mut scores = self
            .centroids
            .chunks_exact(self.dim)
            .map(|c| dot(xq, c))
            .enumerate()
            .collect::<Vec<_>>();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scores.into_iter().take(k).map(|(i, _)| i).collect()
    }
}

impl Quantizer for FlatQuantizer {
    fn nlist(&self) -> usize {
        self.centroids.len() / self.dim
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn search(&self, x: &[f32], k: usize) -> Vec<Vec<usize>> {
        x.par_chunks_exact(self.dim).map(|xq| self.assign(xq, k)).collect()
    }
}
