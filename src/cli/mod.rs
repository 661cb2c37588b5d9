mod build;
mod likes;
mod search;
pub mod server;

pub use build::*;
pub use likes::*;
pub use search::*;
pub use server::*;

use log::warn;
use tokio::task::block_in_place;

use crate::config::{IndexOptions, Opts, SearchOptions};
use crate::encoder::SidecarEncoder;
use crate::engine::SearchEngine;
use crate::ingest::IngestReport;
use crate::prefs::PreferenceStore;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 创建检索服务并索引图片目录
///
/// 目录中没有可用图片时服务保持降级状态，不视为错误
fn open_engine(
    opts: &Opts,
    index: &IndexOptions,
    search: &SearchOptions,
) -> anyhow::Result<(SearchEngine, IngestReport)> {
    let prefs = PreferenceStore::open(opts.conf_dir().preferences());
    let engine = SearchEngine::builder(SidecarEncoder::new(index.dim))
        .preferences(prefs)
        .index_options(index.clone())
        .search_options(search.clone())
        .build();

    let report = block_in_place(|| engine.rebuild())?;
    if report.succeeded == 0 {
        warn!("图片目录中没有可用的图片: {}", index.images.display());
    }
    Ok((engine, report))
}
