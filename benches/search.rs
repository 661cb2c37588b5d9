use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use imrank::config::IndexOptions;
use imrank::index::{IndexBuilder, SearchParams};
use imrank::store::{EmbeddingStore, ImageRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIM: usize = 512;

// 生成有聚类模式的测试数据
fn generate_store(n: usize, num_clusters: usize) -> EmbeddingStore {
    let mut rng = StdRng::seed_from_u64(42);
    let centers = (0..num_clusters)
        .map(|_| (0..DIM).map(|_| rng.random_range(-1.0..1.0)).collect::<Vec<f32>>())
        .collect::<Vec<_>>();

    let mut store = EmbeddingStore::new(DIM);
    for i in 0..n {
        let v = centers[i % num_clusters].iter().map(|x| x + rng.random_range(-0.2..0.2)).collect();
        let record = ImageRecord::from_path(format!("{i}.jpg")).unwrap();
        store.insert(record, v).unwrap();
    }
    store
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_512d");

    for n in [1000, 10000, 50000] {
        let store = generate_store(n, 64);
        let opts = IndexOptions { kmeans_iter: 10, ..Default::default() };
        let index = IndexBuilder::new(opts).build(&store).unwrap();
        let (_, query) = store.get(n / 2).unwrap();
        let query = black_box(query.to_vec());

        for nprobe in [1, 10, 100] {
            group.bench_with_input(
                BenchmarkId::new(format!("{}_{n}", index.kind()), nprobe),
                &nprobe,
                |b, &nprobe| b.iter(|| index.search(&query, 15, SearchParams { nprobe })),
            );
        }
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_512d");
    group.sample_size(10);

    for n in [1000, 5000] {
        let store = generate_store(n, 64);
        let opts = IndexOptions { kmeans_iter: 10, ..Default::default() };
        group.bench_function(format!("build_{n}"), |b| {
            b.iter(|| IndexBuilder::new(opts.clone()).build(&store).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_search, bench_build);
criterion_main!(benches);
