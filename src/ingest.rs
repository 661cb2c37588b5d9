use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{info, warn};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::encoder::Encoder;
use crate::error::Result;
use crate::store::{EmbeddingStore, ImageRecord};
use crate::utils::pb_style;

static RE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)^(jpg|jpeg|png)$").expect("failed to build regex"));

/// 单张图片的失败原因
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub id: String,
    pub path: PathBuf,
    pub reason: String,
}

/// 一次导入的结果，部分图片失败不影响其余图片
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub succeeded: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn skipped(&self) -> usize {
        self.failures.len()
    }
}

/// 扫描目录下的图片文件（不递归），按路径排序以保证每次导入的顺序一致
///
/// 目录不存在时会自动创建
pub fn scan_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let mut paths = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| RE_SUFFIX.is_match(&ext.to_string_lossy()))
        })
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

/// 编码目录下的所有图片，返回新的存储和导入报告
pub fn ingest_directory(
    encoder: &dyn Encoder,
    dir: &Path,
    dim: usize,
) -> Result<(EmbeddingStore, IngestReport)> {
    info!("开始扫描目录: {}", dir.display());
    let paths = scan_images(dir)?;
    if paths.is_empty() {
        warn!("目录中没有图片: {}", dir.display());
    } else {
        info!("扫描完成，共 {} 张图片", paths.len());
    }
    Ok(ingest_paths(encoder, &paths, dim))
}

/// 并行编码给定的图片，按输入顺序插入存储
pub fn ingest_paths(encoder: &dyn Encoder, paths: &[PathBuf], dim: usize) -> (EmbeddingStore, IngestReport) {
    let pb = ProgressBar::new(paths.len() as u64).with_style(pb_style());
    pb.set_message("正在编码图片");

    let encoded = paths
        .par_iter()
        .progress_with(pb.clone())
        .map(|path| encoder.encode_image(path))
        .collect::<Vec<_>>();
    pb.finish_and_clear();

    let mut store = EmbeddingStore::new(dim);
    let mut report = IngestReport::default();
    for (path, vector) in paths.iter().zip(encoded) {
        let Some(record) = ImageRecord::from_path(path) else {
            continue;
        };
        let id = record.id.clone();
        match vector.and_then(|v| store.insert(record, v)) {
            Ok(_) => report.succeeded += 1,
            Err(e) => {
                warn!("跳过图片 {}: {e}", path.display());
                report.failures.push(IngestFailure { id, path: path.clone(), reason: e.to_string() });
            }
        }
    }

    info!("导入完成：成功 {}，跳过 {}", report.succeeded, report.skipped());
    (store, report)
}
