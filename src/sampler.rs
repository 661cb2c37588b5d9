//! 没有文本和偏好时使用的随机结果
//!
//! 生成器固定为 ChaCha8（`rand_chacha`），以 `seed_from_u64(seed)` 初始化。先用
//! `rand::seq::index::sample` 无放回地抽取位置，再按抽取顺序从同一个生成器中依次取
//! `[0, 1)` 的 f32 作为分数。相同的种子和相同顺序的语料总是得到相同的结果。

use rand::seq::index::sample as sample_index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::store::{EmbeddingStore, ImageRecord};

/// 未指定种子时随机生成的种子范围上限
pub const MAX_SEED: u64 = 1_000_000;

/// 生成一个新的随机种子
pub fn fresh_seed() -> u64 {
    rand::rng().random_range(0..=MAX_SEED)
}

/// 按种子从语料中抽取最多 k 条记录，并附带随机分数
pub fn sample(seed: u64, k: usize, store: &EmbeddingStore) -> Vec<(ImageRecord, f32)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let amount = k.min(store.len());
    let positions = sample_index(&mut rng, store.len(), amount);

    let records = store.records();
    positions
        .iter()
        .map(|position| {
            let score: f32 = rng.random();
            (records[position].clone(), score)
        })
        .collect()
}
