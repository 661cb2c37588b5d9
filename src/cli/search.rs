use clap::{Parser, ValueEnum};
use log::debug;
use tokio::task::block_in_place;

use crate::cli::{SubCommandExtend, open_engine};
use crate::config::{IndexOptions, Opts, SearchOptions};
use crate::engine::{SearchRequest, SearchResult};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub index: IndexOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 查询文本，为空时根据用户偏好搜索或返回随机结果
    #[arg(default_value_t = String::new())]
    pub text: String,
    /// 返回的结果数量
    #[arg(short = 'n', long, value_name = "N", default_value_t = 15)]
    pub count: usize,
    /// 混合该钱包地址的用户偏好
    #[arg(short, long, value_name = "ADDRESS")]
    pub wallet: Option<String>,
    /// 随机结果使用的种子
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let (engine, _) = open_engine(opts, &self.index, &self.search)?;

        let req = SearchRequest {
            text: self.text.clone(),
            num_results: self.count,
            wallet: self.wallet.clone(),
            seed: self.seed,
        };
        let result = block_in_place(|| engine.search(&req))?;
        debug!("搜索模式: {}", result.mode.as_str());

        print_result(&result, self)
    }
}

fn print_result(result: &SearchResult, opts: &SearchCommand) -> anyhow::Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            if let Some(seed) = result.seed {
                println!("# seed = {seed}");
            }
            for hit in &result.results {
                println!("{:.4}\t{}", hit.similarity, hit.record.path.display());
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}
