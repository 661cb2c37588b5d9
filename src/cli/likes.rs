use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::prefs::PreferenceStore;

#[derive(Parser, Debug, Clone)]
pub struct LikesCommand {
    /// 钱包地址
    pub wallet: String,
    /// 将图片加入喜欢的列表
    #[arg(long, value_name = "ID", conflicts_with = "unlike")]
    pub like: Option<String>,
    /// 将图片从喜欢的列表中移除
    #[arg(long, value_name = "ID")]
    pub unlike: Option<String>,
}

impl SubCommandExtend for LikesCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let prefs = PreferenceStore::open(opts.conf_dir().preferences());
        if let Some(id) = &self.like {
            prefs.like(&self.wallet, id)?;
        }
        if let Some(id) = &self.unlike {
            prefs.unlike(&self.wallet, id)?;
        }
        for id in prefs.likes(&self.wallet)? {
            println!("{id}");
        }
        Ok(())
    }
}
