use clap::Parser;

use crate::cli::{SubCommandExtend, open_engine};
use crate::config::{IndexOptions, Opts, SearchOptions};

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    #[command(flatten)]
    pub index: IndexOptions,
    /// 列出每张被跳过的图片及原因
    #[arg(short, long)]
    pub verbose: bool,
}

impl SubCommandExtend for BuildCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let (engine, report) = open_engine(opts, &self.index, &SearchOptions::default())?;
        let health = engine.health()?;

        println!("indexed\t{}", report.succeeded);
        println!("skipped\t{}", report.skipped());
        match health.index_type {
            Some(kind) => println!("index\t{kind}"),
            None => println!("index\tnone"),
        }
        if let Some(nlist) = health.nlist {
            println!("nlist\t{nlist}");
        }
        if self.verbose {
            for failure in &report.failures {
                println!("[SKIP] {}: {}", failure.path.display(), failure.reason);
            }
        }
        Ok(())
    }
}
