use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use imrank::config::{IndexOptions, SearchOptions};
use imrank::encoder::{Encoder, SidecarEncoder};
use imrank::engine::SearchMode;
use imrank::index::IndexKind;
use imrank::prefs::PreferenceStore;
use imrank::sampler::MAX_SEED;
use imrank::store::{EmbeddingStore, ImageRecord};
use imrank::{Error, Result, SearchEngine, SearchRequest};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rstest::*;
use tempfile::TempDir;

/// 按查询文本查表返回向量
struct TableEncoder {
    dim: usize,
    table: HashMap<String, Vec<f32>>,
}

impl TableEncoder {
    fn new(dim: usize, entries: &[(&str, Vec<f32>)]) -> Self {
        let table = entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Self { dim, table }
    }
}

impl Encoder for TableEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        self.table.get(text).cloned().ok_or_else(|| Error::Encoder {
            path: PathBuf::from(text),
            reason: "unknown text".to_string(),
        })
    }

    fn encode_image(&self, path: &Path) -> Result<Vec<f32>> {
        Err(Error::Encoder { path: path.to_path_buf(), reason: "unsupported".to_string() })
    }
}

fn store_of(dim: usize, vectors: &[Vec<f32>]) -> EmbeddingStore {
    let mut store = EmbeddingStore::new(dim);
    for (i, v) in vectors.iter().enumerate() {
        let record = ImageRecord::from_path(format!("images/{i}.jpg")).unwrap();
        store.insert(record, v.clone()).unwrap();
    }
    store
}

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect()).collect()
}

fn request(text: &str, num_results: usize) -> SearchRequest {
    SearchRequest { text: text.to_string(), num_results, ..Default::default() }
}

/// 三张图片 A、B、C 分别位于三个坐标轴上
#[fixture]
fn abc() -> SearchEngine {
    let encoder = TableEncoder::new(
        3,
        &[("b", vec![0.1, 1.0, 0.0]), ("between", vec![0.6, 0.8, 0.0]), ("bad", vec![1.0, 0.0])],
    );
    let engine = SearchEngine::builder(encoder)
        .index_options(IndexOptions { dim: 3, ..Default::default() })
        .build();
    let store =
        store_of(3, &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]]);
    engine.install(store).unwrap();
    engine
}

fn rank(result: &imrank::engine::SearchResult, position: usize) -> Option<usize> {
    result.results.iter().position(|hit| hit.record.position == position)
}

#[rstest]
fn test_text_search(abc: SearchEngine) {
    let result = abc.search(&request("b", 3)).unwrap();
    assert_eq!(result.mode, SearchMode::Text);
    assert_eq!(result.seed, None);
    assert_eq!(result.total, 3);
    assert_eq!(result.results[0].record.id, "1");
    assert!(result.results[0].similarity > 0.99);
    assert!(result.results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[rstest]
fn test_preference_does_not_hurt_liked(abc: SearchEngine) {
    let before = abc.search(&request("between", 3)).unwrap();

    abc.like("wallet", "0").unwrap();
    let req = SearchRequest { wallet: Some("wallet".into()), ..request("between", 3) };
    let after = abc.search(&req).unwrap();

    assert_eq!(after.mode, SearchMode::Blended);
    assert!(rank(&after, 0).unwrap() <= rank(&before, 0).unwrap());
    assert_eq!(after.results[0].record.id, "0");
}

#[rstest]
fn test_preference_only(abc: SearchEngine) {
    abc.like("wallet", "2").unwrap();
    let req = SearchRequest { wallet: Some("wallet".into()), ..request("", 3) };
    let result = abc.search(&req).unwrap();
    assert_eq!(result.mode, SearchMode::Preference);
    assert_eq!(result.results[0].record.id, "2");
    assert!((result.results[0].similarity - 1.0).abs() < 1e-4);
}

#[rstest]
fn test_unresolved_likes_are_ignored(abc: SearchEngine) {
    abc.like("wallet", "missing").unwrap();
    let req = SearchRequest { wallet: Some("wallet".into()), ..request("b", 3) };
    assert_eq!(abc.search(&req).unwrap().mode, SearchMode::Text);

    let req = SearchRequest { wallet: Some("wallet".into()), seed: Some(5), ..request("", 3) };
    let result = abc.search(&req).unwrap();
    assert_eq!(result.mode, SearchMode::Random);
    assert_eq!(result.seed, Some(5));
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(100)]
fn test_result_count(abc: SearchEngine, #[case] k: usize) {
    let result = abc.search(&request("b", k)).unwrap();
    assert_eq!(result.results.len(), k.min(3));
    assert_eq!(result.total, result.results.len());
    let positions = result.results.iter().map(|h| h.record.position).collect::<HashSet<_>>();
    assert_eq!(positions.len(), result.results.len());
}

#[rstest]
fn test_random_is_reproducible(abc: SearchEngine) {
    let req = SearchRequest { seed: Some(42), ..request("  ", 2) };
    let a = abc.search(&req).unwrap();
    let b = abc.search(&req).unwrap();
    assert_eq!(a.mode, SearchMode::Random);
    assert_eq!(a.seed, Some(42));
    assert_eq!(a.results, b.results);
    assert_eq!(a.results.len(), 2);
}

#[rstest]
fn test_random_reports_seed(abc: SearchEngine) {
    let a = abc.search(&request("", 3)).unwrap();
    let seed = a.seed.unwrap();
    assert!(seed <= MAX_SEED);

    let req = SearchRequest { seed: Some(seed), ..request("", 3) };
    assert_eq!(abc.search(&req).unwrap().results, a.results);
}

#[rstest]
fn test_dimension_mismatch(abc: SearchEngine) {
    assert!(matches!(
        abc.search(&request("bad", 3)),
        Err(Error::DimensionMismatch { expected: 3, actual: 2 })
    ));
}

#[rstest]
fn test_encoder_failure(abc: SearchEngine) {
    assert!(matches!(abc.search(&request("unknown", 3)), Err(Error::Encoder { .. })));
}

#[rstest]
#[case(999, IndexKind::Exact)]
#[case(1000, IndexKind::Exact)]
#[case(1001, IndexKind::Approximate)]
fn test_index_selection(#[case] n: usize, #[case] kind: IndexKind) {
    let dim = 16;
    let vectors = random_vectors(n, dim, 7);
    let probe = 123;
    let encoder = TableEncoder::new(dim, &[("probe", vectors[probe].clone())]);
    let engine = SearchEngine::builder(encoder)
        .index_options(IndexOptions { dim, kmeans_iter: 5, ..Default::default() })
        .build();

    let health = engine.install(store_of(dim, &vectors)).unwrap();
    assert!(health.ready);
    assert_eq!(health.indexed_images, n);
    assert_eq!(health.index_type, Some(kind));
    match kind {
        IndexKind::Exact => assert_eq!(health.nlist, None),
        IndexKind::Approximate => assert_eq!(health.nlist, Some(100)),
    }

    let result = engine.search(&request("probe", 15)).unwrap();
    assert_eq!(result.results[0].record.position, probe);
    assert!(result.results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[rstest]
#[case("!!!")]
#[case("🙂")]
fn test_symbol_only_query(#[case] text: &str) {
    let engine = SearchEngine::builder(SidecarEncoder::new(3))
        .index_options(IndexOptions { dim: 3, ..Default::default() })
        .build();
    engine.install(store_of(3, &[vec![1.0, 0.0, 0.0]])).unwrap();

    let result = engine.search(&request(text, 5)).unwrap();
    assert_eq!(result.mode, SearchMode::Text);
    assert_eq!(result.results.len(), 1);
}

#[test]
fn test_empty_corpus() {
    let engine = SearchEngine::builder(TableEncoder::new(3, &[("b", vec![0.0, 1.0, 0.0])]))
        .index_options(IndexOptions { dim: 3, ..Default::default() })
        .build();
    assert!(matches!(engine.install(EmbeddingStore::new(3)), Err(Error::EmptyCorpus)));

    let health = engine.health().unwrap();
    assert!(!health.ready);
    assert_eq!(health.indexed_images, 0);
    assert!(matches!(engine.search(&request("b", 3)), Err(Error::IndexNotReady)));
}

#[rstest]
fn test_rebuild_to_empty_degrades(abc: SearchEngine) {
    assert!(abc.health().unwrap().ready);
    assert!(abc.install(EmbeddingStore::new(3)).is_err());
    assert!(matches!(abc.search(&request("b", 3)), Err(Error::IndexNotReady)));
}

#[test]
fn test_likes_persist() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs/preferences.json");

    let engine = SearchEngine::builder(TableEncoder::new(3, &[]))
        .preferences(PreferenceStore::open(&path))
        .build();
    assert!(engine.like("w", "a").unwrap());
    assert!(!engine.like("w", "a").unwrap());
    assert!(engine.like("w", "b").unwrap());
    assert!(engine.unlike("w", "a").unwrap());
    assert!(!engine.unlike("nobody", "a").unwrap());
    drop(engine);

    let prefs = PreferenceStore::open(&path);
    assert_eq!(prefs.likes("w").unwrap().into_iter().collect::<Vec<_>>(), vec!["b"]);
    assert!(prefs.likes("nobody").unwrap().is_empty());
}

#[test]
fn test_search_during_rebuild() {
    let dim = 8;
    let small = random_vectors(50, dim, 1);
    let large = random_vectors(1200, dim, 2);
    let encoder = TableEncoder::new(dim, &[("q", small[0].clone())]);
    let engine = Arc::new(
        SearchEngine::builder(encoder)
            .index_options(IndexOptions { dim, kmeans_iter: 3, ..Default::default() })
            .search_options(SearchOptions { nprobe: 100, ..Default::default() })
            .build(),
    );
    engine.install(store_of(dim, &small)).unwrap();

    let searchers = (0..4)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let result = engine.search(&request("q", 5)).unwrap();
                    assert_eq!(result.results.len(), 5);
                    let total = engine.health().unwrap().indexed_images;
                    assert!(total == 50 || total == 1200);
                }
            })
        })
        .collect::<Vec<_>>();

    for i in 0..4 {
        let vectors = if i % 2 == 0 { &large } else { &small };
        engine.install(store_of(dim, vectors)).unwrap();
    }
    for s in searchers {
        s.join().unwrap();
    }
    assert_eq!(engine.health().unwrap().indexed_images, 50);
}
