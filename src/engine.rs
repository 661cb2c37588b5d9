use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{IndexOptions, SearchOptions};
use crate::encoder::{Encoder, SerialEncoder};
use crate::error::{Error, Result};
use crate::guard::ConcurrencyGuard;
use crate::index::{Index, IndexBuilder, IndexKind, SearchParams};
use crate::ingest::{IngestReport, ingest_directory};
use crate::prefs::{PreferenceStore, aggregate};
use crate::store::{EmbeddingStore, ImageRecord};
use crate::{metrics, sampler, utils};

/// 搜索请求
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// 查询文本，可以为空
    pub text: String,
    /// 需要的结果数量
    pub num_results: usize,
    /// 用于混合用户偏好的钱包地址
    pub wallet: Option<String>,
    /// 随机结果使用的种子
    pub seed: Option<u64>,
}

/// 查询向量的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// 只有文本
    Text,
    /// 文本与用户偏好混合
    Blended,
    /// 只有用户偏好
    Preference,
    /// 随机结果
    Random,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Blended => "blended",
            Self::Preference => "preference",
            Self::Random => "random",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: ImageRecord,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub results: Vec<SearchHit>,
    pub total: usize,
    /// 返回随机结果时实际使用的种子
    pub seed: Option<u64>,
    pub mode: SearchMode,
}

/// 服务状态
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub ready: bool,
    pub indexed_images: usize,
    pub index_type: Option<IndexKind>,
    pub nlist: Option<usize>,
}

/// 构建完成的语料和索引，二者总是一起替换
#[derive(Debug)]
pub struct Corpus {
    pub store: EmbeddingStore,
    pub index: Index,
}

/// 检索服务，持有索引、用户偏好和编码器
pub struct SearchEngine {
    encoder: Arc<dyn Encoder>,
    prefs: PreferenceStore,
    corpus: ConcurrencyGuard<Option<Corpus>>,
    index_opts: IndexOptions,
    search_opts: SearchOptions,
}

pub struct SearchEngineBuilder {
    encoder: Arc<dyn Encoder>,
    prefs: Option<PreferenceStore>,
    index_opts: IndexOptions,
    search_opts: SearchOptions,
}

impl SearchEngineBuilder {
    pub fn new<E: Encoder + 'static>(encoder: E) -> Self {
        Self {
            encoder: Arc::new(encoder),
            prefs: None,
            index_opts: IndexOptions::default(),
            search_opts: SearchOptions::default(),
        }
    }

    /// 用户偏好存储，默认为不落盘的内存存储
    pub fn preferences(mut self, prefs: PreferenceStore) -> Self {
        self.prefs = Some(prefs);
        self
    }

    pub fn index_options(mut self, opts: IndexOptions) -> Self {
        self.index_opts = opts;
        self
    }

    pub fn search_options(mut self, opts: SearchOptions) -> Self {
        self.search_opts = opts;
        self
    }

    pub fn build(self) -> SearchEngine {
        let encoder: Arc<dyn Encoder> = if self.search_opts.serial_encoder {
            info!("编码请求将由专用线程串行处理");
            Arc::new(SerialEncoder::new(SharedEncoder(self.encoder)))
        } else {
            self.encoder
        };
        SearchEngine {
            encoder,
            prefs: self.prefs.unwrap_or_else(PreferenceStore::in_memory),
            corpus: ConcurrencyGuard::new(None),
            index_opts: self.index_opts,
            search_opts: self.search_opts,
        }
    }
}

struct SharedEncoder(Arc<dyn Encoder>);

impl Encoder for SharedEncoder {
    fn dim(&self) -> usize {
        self.0.dim()
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        self.0.encode_text(text)
    }

    fn encode_image(&self, path: &Path) -> Result<Vec<f32>> {
        self.0.encode_image(path)
    }
}

impl SearchEngine {
    pub fn builder<E: Encoder + 'static>(encoder: E) -> SearchEngineBuilder {
        SearchEngineBuilder::new(encoder)
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn index_options(&self) -> &IndexOptions {
        &self.index_opts
    }

    /// 重新扫描配置的图片目录并重建索引
    pub fn rebuild(&self) -> Result<IngestReport> {
        self.rebuild_from(&self.index_opts.images)
    }

    /// 扫描指定目录并重建索引
    ///
    /// 编码在持锁之前完成，只有构建索引和替换时持有写锁。没有图片导入成功时服务进入
    /// 降级状态，导入报告照常返回。
    pub fn rebuild_from(&self, dir: &Path) -> Result<IngestReport> {
        let (store, report) = ingest_directory(self.encoder.as_ref(), dir, self.index_opts.dim)?;
        match self.install(store) {
            Ok(_) | Err(Error::EmptyCorpus) => Ok(report),
            Err(e) => Err(e),
        }
    }

    /// 为给定的存储构建索引并替换当前语料
    ///
    /// 语料为空时服务进入降级状态并返回 `EmptyCorpus`
    pub fn install(&self, store: EmbeddingStore) -> Result<Health> {
        let mut corpus = self.corpus.write()?;
        let builder = IndexBuilder::new(self.index_opts.clone());
        match builder.build(&store) {
            Ok(index) => {
                info!("索引构建完成：{} 张图片，类型 {}", index.len(), index.kind());
                *corpus = Some(Corpus { store, index });
            }
            Err(Error::EmptyCorpus) => {
                warn!("没有可用的图片，搜索服务不可用");
                *corpus = None;
                metrics::set_indexed_images(0);
                return Err(Error::EmptyCorpus);
            }
            Err(e) => return Err(e),
        }
        let health = Self::health_of(corpus.as_ref());
        metrics::set_indexed_images(health.indexed_images);
        Ok(health)
    }

    pub fn health(&self) -> Result<Health> {
        let corpus = self.corpus.read()?;
        Ok(Self::health_of(corpus.as_ref()))
    }

    fn health_of(corpus: Option<&Corpus>) -> Health {
        match corpus {
            Some(c) => Health {
                ready: true,
                indexed_images: c.store.len(),
                index_type: Some(c.index.kind()),
                nlist: c.index.nlist(),
            },
            None => Health { ready: false, indexed_images: 0, index_type: None, nlist: None },
        }
    }

    /// 所有已索引的图片，按位置排序
    pub fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let corpus = self.corpus.read()?;
        Ok(corpus.as_ref().map(|c| c.store.records().to_vec()).unwrap_or_default())
    }

    pub fn like(&self, wallet: &str, image_id: &str) -> Result<bool> {
        self.prefs.like(wallet, image_id)
    }

    pub fn unlike(&self, wallet: &str, image_id: &str) -> Result<bool> {
        self.prefs.unlike(wallet, image_id)
    }

    pub fn likes(&self, wallet: &str) -> Result<BTreeSet<String>> {
        self.prefs.likes(wallet)
    }

    /// 搜索图片
    ///
    /// 文本为空且没有可用的用户偏好时返回随机结果；否则用文本向量（可能混合偏好向量）
    /// 查询索引，结果按相似度降序排列。
    pub fn search(&self, req: &SearchRequest) -> Result<SearchResult> {
        let start = Instant::now();

        let text = req.text.trim();
        // 编码可能很慢，在获取读锁之前完成
        let text_vector = if text.is_empty() { None } else { Some(self.encode_text(text)?) };

        let corpus = self.corpus.read()?;
        let corpus = corpus.as_ref().ok_or(Error::IndexNotReady)?;
        let store = &corpus.store;

        let preference = match &req.wallet {
            Some(wallet) => aggregate(store, &self.prefs.likes(wallet)?),
            None => None,
        };

        let (query, mode) = match (text_vector, preference) {
            (None, None) => {
                let seed = req.seed.unwrap_or_else(sampler::fresh_seed);
                debug!("没有查询文本和用户偏好，使用随机结果，种子 = {seed}");
                let results = sampler::sample(seed, req.num_results, store)
                    .into_iter()
                    .map(|(record, similarity)| SearchHit { record, similarity })
                    .collect::<Vec<_>>();
                metrics::inc_search(
                    SearchMode::Random.as_str(),
                    &corpus.index.kind().to_string(),
                    start.elapsed().as_secs_f32(),
                );
                return Ok(SearchResult {
                    total: results.len(),
                    results,
                    seed: Some(seed),
                    mode: SearchMode::Random,
                });
            }
            (Some(t), None) => (t, SearchMode::Text),
            (Some(t), Some(p)) => match self.blend(&t, &p) {
                Some(q) => (q, SearchMode::Blended),
                None => (t, SearchMode::Text),
            },
            (None, Some(mut p)) => {
                utils::normalize(&mut p)?;
                (p, SearchMode::Preference)
            }
        };

        if query.len() != store.dim() {
            return Err(Error::DimensionMismatch { expected: store.dim(), actual: query.len() });
        }

        let k = req.num_results.min(store.len());
        let params = SearchParams { nprobe: self.search_opts.nprobe };
        let neighbors = corpus.index.search(&query, k, params);

        let mut results = Vec::with_capacity(neighbors.len());
        for n in neighbors {
            match store.get(n.position) {
                Ok((record, _)) => {
                    results.push(SearchHit { record: record.clone(), similarity: n.score })
                }
                Err(e) => warn!("跳过无效的搜索结果: {e}"),
            }
        }

        let elapsed = start.elapsed().as_secs_f32();
        debug!("搜索完成：模式 {}，{} 条结果，耗时 {:.2}ms", mode.as_str(), results.len(), elapsed * 1000.);
        metrics::inc_search(mode.as_str(), &corpus.index.kind().to_string(), elapsed);

        Ok(SearchResult { total: results.len(), results, seed: None, mode })
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = self.encoder.encode_text(text)?;
        utils::normalize(&mut v)?;
        Ok(v)
    }

    /// `normalize(w * text + (1 - w) * preference)`，结果为零向量时返回 None
    fn blend(&self, text: &[f32], preference: &[f32]) -> Option<Vec<f32>> {
        if text.len() != preference.len() {
            return None;
        }
        let w = self.search_opts.text_weight;
        let mut q = utils::weighted_sum(w, text, 1.0 - w, preference);
        utils::normalize(&mut q).ok()?;
        Some(q)
    }
}
