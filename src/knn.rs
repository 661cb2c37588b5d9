use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rayon::prelude::*;

use crate::utils::dot;

/// 单个近邻结果，score 为内积相似度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub score: f32,
}

impl Eq for Neighbor {}

/// 排序时"更大"表示"更差"：相似度更低，或相似度相同时位置更靠后
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score).then(self.position.cmp(&other.position))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 维护相似度最高的 k 个近邻，堆顶为当前最差的一个
pub struct TopKNeighbors {
    heap: BinaryHeap<Neighbor>,
    k: usize,
}

impl TopKNeighbors {
    pub fn new(k: usize) -> Self {
        Self { heap: BinaryHeap::with_capacity(k + 1), k }
    }

    pub fn push(&mut self, neighbor: Neighbor) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() == self.k {
            match self.heap.peek() {
                Some(worst) if neighbor < *worst => {
                    self.heap.pop();
                }
                _ => return,
            }
        }
        self.heap.push(neighbor);
    }

    pub fn extend(&mut self, neighbors: impl IntoIterator<Item = Neighbor>) {
        for n in neighbors {
            self.push(n);
        }
    }

    /// 按相似度降序返回，相似度相同时位置小的在前
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec()
    }
}

/// 在一组展平的向量 `codes` 中搜索与 `query` 内积最大的 k 个，`ids` 为每条向量的位置
pub fn knn_inner_product(query: &[f32], ids: &[u64], codes: &[f32], k: usize) -> TopKNeighbors {
    let dim = query.len();
    let mut topk = TopKNeighbors::new(k);
    for (&id, code) in ids.iter().zip(codes.chunks_exact(dim)) {
        topk.push(Neighbor { position: id as usize, score: dot(query, code) });
    }
    topk
}

/// 并行版本，将数据按 `chunk_size` 条分块后分别计算再合并
pub fn par_knn_inner_product(
    query: &[f32],
    ids: &[u64],
    codes: &[f32],
    k: usize,
    chunk_size: usize,
) -> Vec<Neighbor> {
    let dim = query.len();
    let chunk_size = chunk_size.max(1);
    ids.par_chunks(chunk_size)
        .zip(codes.par_chunks(chunk_size * dim))
        .map(|(ids, codes)| knn_inner_product(query, ids, codes, k).into_sorted_vec())
        .reduce(Vec::new, |a, b| {
            let mut topk = TopKNeighbors::new(k);
            topk.extend(a);
            topk.extend(b);
            topk.into_sorted_vec()
        })
}
