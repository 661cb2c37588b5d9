use std::fmt;

use log::{debug, info};
use rand::SeedableRng;
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::IndexOptions;
use crate::error::{Error, Result};
use crate::flat::FlatIndex;
use crate::ivf::IvfFlatIndex;
use crate::knn::Neighbor;
use crate::store::EmbeddingStore;

/// 每个聚类中心最多使用的训练样本数量
const MAX_POINTS_PER_CENTROID: usize = 39;

/// 索引类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexKind {
    /// 暴力搜索
    Exact,
    /// 倒排文件索引
    Approximate,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "IndexFlatIP"),
            Self::Approximate => write!(f, "IndexIVFFlat"),
        }
    }
}

/// 单次查询的参数，随调用传入，不保存在索引上
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    /// 扫描的倒排列表数量，仅对 IVF 索引有效
    pub nprobe: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { nprobe: 10 }
    }
}

/// 构建完成的最近邻索引
#[derive(Debug, Clone)]
pub enum Index {
    Flat(FlatIndex),
    Ivf(IvfFlatIndex),
}

impl Index {
    pub fn kind(&self) -> IndexKind {
        match self {
            Self::Flat(_) => IndexKind::Exact,
            Self::Ivf(_) => IndexKind::Approximate,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Flat(index) => index.ntotal(),
            Self::Ivf(index) => index.ntotal(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 聚类中心数量，暴力索引返回 None
    pub fn nlist(&self) -> Option<usize> {
        match self {
            Self::Flat(_) => None,
            Self::Ivf(index) => Some(index.nlist()),
        }
    }

    /// 按相似度降序返回最多 k 个近邻
    pub fn search(&self, query: &[f32], k: usize, params: SearchParams) -> Vec<Neighbor> {
        match self {
            Self::Flat(index) => index.search(query, k),
            Self::Ivf(index) => index.search(query, k, params.nprobe.min(index.nlist())),
        }
    }

    fn add(&mut self, start: usize, data: &[f32]) {
        match self {
            Self::Flat(index) => index.add(start, data),
            Self::Ivf(index) => index.add(start, data),
        }
    }
}

/// 根据语料规模选择并构建索引
pub struct IndexBuilder {
    opts: IndexOptions,
}

impl IndexBuilder {
    pub fn new(opts: IndexOptions) -> Self {
        Self { opts }
    }

    /// 根据语料数量选择索引类型
    pub fn choose(&self, n: usize) -> IndexKind {
        if n > self.opts.exact_threshold { IndexKind::Approximate } else { IndexKind::Exact }
    }

    /// IVF 索引的聚类中心数量
    pub fn nlist(&self, n: usize) -> usize {
        self.opts.max_nlist.min(n / 10).max(1)
    }

    /// 为存储中的全部向量构建索引，只有构建完成后才会返回
    pub fn build(&self, store: &EmbeddingStore) -> Result<Index> {
        let n = store.len();
        if n == 0 {
            return Err(Error::EmptyCorpus);
        }

        let mut index = match self.choose(n) {
            IndexKind::Exact => {
                info!("共 {n} 张图片，使用暴力搜索索引");
                Index::Flat(FlatIndex::new(store.dim()))
            }
            IndexKind::Approximate => {
                let nlist = self.nlist(n);
                let train = self.training_set(store, nlist);
                info!(
                    "共 {n} 张图片，使用 IVF 索引，nlist = {nlist}，训练样本 {}",
                    train.len() / store.dim()
                );
                Index::Ivf(IvfFlatIndex::train(&train, store.dim(), nlist, self.opts.kmeans_iter))
            }
        };

        for (start, batch) in store.batches(self.opts.batch_size) {
            index.add(start, batch);
        }
        debug!("索引添加完成：{} 条向量", index.len());

        if let Index::Ivf(ivf) = &index {
            info!("倒排列表不平衡度：{:.2}", ivf.imbalance());
        }

        debug_assert_eq!(index.len(), store.len(), "index size mismatch");
        Ok(index)
    }

    /// 从真实语料中随机抽取训练集
    fn training_set(&self, store: &EmbeddingStore, nlist: usize) -> Vec<f32> {
        let n = store.len();
        let amount = n.min(nlist * MAX_POINTS_PER_CENTROID);
        let mut rng = ChaCha8Rng::seed_from_u64(self.opts.train_seed);
        let mut positions = sample(&mut rng, n, amount).into_vec();
        positions.sort_unstable();

        let dim = store.dim();
        let vectors = store.vectors();
        let mut train = Vec::with_capacity(amount * dim);
        for position in positions {
            train.extend_from_slice(&vectors[position * dim..(position + 1) * dim]);
        }
        train
    }
}
