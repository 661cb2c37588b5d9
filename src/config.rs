use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::store::DEFAULT_DIM;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = ProjectDirs::from("", "imrank", "imrank")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".imrank"));
    ConfDir { path }
});

fn default_config_dir() -> String {
    CONF_DIR.path().to_string_lossy().to_string()
}

#[derive(Parser, Debug, Clone)]
pub struct IndexOptions {
    /// 图片所在目录，只扫描 jpg、jpeg、png
    #[arg(long, value_name = "DIR", default_value = "images")]
    pub images: PathBuf,
    /// 嵌入向量维数
    #[arg(long, value_name = "D", default_value_t = DEFAULT_DIM)]
    pub dim: usize,
    /// 图片数量超过该值时使用 IVF 索引，否则使用暴力搜索
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub exact_threshold: usize,
    /// 构建索引时每批添加的向量数量
    #[arg(long, value_name = "SIZE", default_value_t = 32)]
    pub batch_size: usize,
    /// IVF 聚类中心数量上限
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub max_nlist: usize,
    /// kmeans 最大迭代次数
    #[arg(long, value_name = "N", default_value_t = 20)]
    pub kmeans_iter: usize,
    /// 抽取训练集使用的随机种子
    #[arg(long, value_name = "SEED", default_value_t = 42)]
    pub train_seed: u64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::parse_from(["imrank"])
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// IVF 索引搜索的倒排列表数量，不会超过聚类中心数量
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub nprobe: usize,
    /// 与用户偏好混合时文本向量的权重，偏好向量的权重为 1 - W
    #[arg(long, value_name = "W", default_value_t = 0.7, value_parser = parse_weight)]
    pub text_weight: f32,
    /// 所有编码请求都交给同一个专用线程串行处理
    #[arg(long)]
    pub serial_encoder: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::parse_from(["imrank"])
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imrank", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imrank 配置文件目录，用于保存用户偏好
    #[arg(short, long, default_value_t = default_config_dir())]
    pub conf_dir: String,
}

impl Opts {
    pub fn conf_dir(&self) -> ConfDir {
        ConfDir::from_str(&self.conf_dir).unwrap_or_else(|e| match e {})
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 索引图片目录并启动 HTTP 搜索服务
    Server(ServerCommand),
    /// 索引图片目录并执行一次搜索
    Search(SearchCommand),
    /// 索引图片目录并输出构建报告
    Build(BuildCommand),
    /// 查看用户喜欢的图片
    Likes(LikesCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回用户偏好文件的路径
    pub fn preferences(&self) -> PathBuf {
        self.path.join("preferences.json")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

fn parse_weight(s: &str) -> Result<f32, String> {
    let w: f32 = s.parse().map_err(|e| format!("无效的权重 {s}: {e}"))?;
    if (0.0..=1.0).contains(&w) {
        Ok(w)
    } else {
        Err(format!("权重必须在 0 到 1 之间: {s}"))
    }
}
