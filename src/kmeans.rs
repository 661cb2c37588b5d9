use kmeans::{EuclideanDistance, KMeans, KMeansConfig, KMeansState};
use log::info;

use crate::utils;

/// 计算聚类结果的不平衡度，1.0 表示完全平衡
pub fn imbalance_factor(hist: &[usize]) -> f32 {
    let (mut tot, mut uf) = (0.0, 0.0);
    for h in hist {
        let h = *h as f32;
        tot += h;
        uf += h.powf(2.0);
    }
    if tot == 0.0 {
        return 0.0;
    }
    uf * hist.len() as f32 / tot.powf(2.0)
}

/// 使用 kmeans 聚类，返回归一化后的聚类中心
///
/// 参数：
/// - x: 输入向量，长度为 n * dim
/// - dim: 向量维数
/// - nc: 聚类中心数量
/// - max_iter: 最大迭代次数
/// - verbose: 是否打印详细信息
///
/// 中心点会被归一化，使得内积分配等价于余弦距离分配
pub fn train_centroids(x: &[f32], dim: usize, nc: usize, max_iter: usize, verbose: bool) -> Vec<f32> {
    let n = x.len() / dim;
    assert!(n >= nc, "训练样本数量必须不少于聚类中心数量");

    let km: KMeans<_, 8, _> = KMeans::new(x, n, dim, EuclideanDistance);
    let conf = if verbose {
        KMeansConfig::build()
            .init_done(&|_s: &KMeansState<f32>| info!("KMeans 初始化完成"))
            .iteration_done(&|s: &KMeansState<f32>, nr: usize, new_distsum: f32| {
                info!(
                    "第 {} 轮 - 不平衡度：{:.2} | 距离和变化：{:+.2}",
                    nr,
                    imbalance_factor(&s.centroid_frequency),
                    new_distsum - s.distsum
                );
            })
            .build()
    } else {
        KMeansConfig::default()
    };
    // NOTE: init_kmeanplusplus 会 panic，不知道为啥
    let result = km.kmeans_lloyd(nc, max_iter, KMeans::init_random_partition, &conf);

    let mut centroids = result.centroids.to_vec();
    centroids.truncate(nc * dim);
    for c in centroids.chunks_exact_mut(dim) {
        // 空簇的中心可能为零或 NaN，置零后它不会成为任何向量的最近中心
        if utils::normalize(c).is_err() {
            c.fill(0.0);
        }
    }
    centroids
}
