pub mod invlists;
pub mod quantizer;

pub use invlists::*;
pub use quantizer::*;
use rayon::prelude::*;

use crate::knn::{Neighbor, TopKNeighbors, knn_inner_product};

pub type IvfFlatIndex = IvfFlat<FlatQuantizer, ArrayInvertedLists>;

/// 倒排文件索引，查询时只扫描最接近的 nprobe 个倒排列表
#[derive(Debug, Clone)]
pub struct IvfFlat<Q: Quantizer, I: InvertedLists> {
    quantizer: Q,
    invlists: I,
    nlist: usize,
}

impl<Q, I> IvfFlat<Q, I>
where
    Q: Quantizer + Sync,
    I: InvertedLists + Sync,
{
    pub fn new(quantizer: Q, invlists: I) -> Self {
        let nlist = quantizer.nlist();
        assert_eq!(nlist, invlists.nlist(), "nlist mismatch");
        assert_eq!(quantizer.dim(), invlists.code_size(), "dim mismatch");
        Self { quantizer, invlists, nlist }
    }

    pub fn nlist(&self) -> usize {
        self.nlist
    }

    pub fn dim(&self) -> usize {
        self.quantizer.dim()
    }

    pub fn ntotal(&self) -> usize {
        self.invlists.ntotal()
    }

    pub fn invlists(&self) -> &I {
        &self.invlists
    }

    pub fn imbalance(&self) -> f32 {
        self.invlists.imbalance()
    }

    /// 批量添加向量，第 i 条向量的 ID 为 `start + i`
    pub fn add(&mut self, start: usize, data: &[f32]) {
        let dim = self.dim();
        let vlists = self.quantizer.search(data, 1);
        for (i, (xq, lists)) in data.chunks_exact(dim).zip(vlists).enumerate() {
            if let Some(&list_no) = lists.first() {
                self.invlists.add_entries(list_no, &[(start + i) as u64], xq);
            }
        }
    }

    /// 搜索最接近的 k 个向量，nprobe 为本次查询扫描的倒排列表数量
    ///
    /// 如果扫描到的向量不足 k 个，返回的结果也会少于 k 个
    pub fn search(&self, query: &[f32], k: usize, nprobe: usize) -> Vec<Neighbor> {
        let nprobe = nprobe.clamp(1, self.nlist);
        let lists = self.quantizer.search(query, nprobe).into_iter().next().unwrap_or_default();

        let partial = lists
            .par_iter()
            .map(|&list_no| {
                let (ids, codes) = self.invlists.get_list(list_no);
                knn_inner_product(query, ids, codes, k).into_sorted_vec()
            })
            .collect::<Vec<_>>();

        let mut topk = TopKNeighbors::new(k);
        topk.extend(partial.into_iter().flatten());
        topk.into_sorted_vec()
    }
}

impl IvfFlatIndex {
    /// 使用训练集训练量化器，返回一个空的索引
    pub fn train(x: &[f32], dim: usize, nlist: usize, max_iter: usize) -> Self {
        let quantizer = FlatQuantizer::train(x, dim, nlist, max_iter);
        Self::new(quantizer, ArrayInvertedLists::new(nlist, dim))
    }
}
