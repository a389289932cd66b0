use passupd_store::Store as _;

use super::{GlobalArgs, SubcmdResult};
use crate::config::GlobalConfig;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Sort entries instead of printing them in traversal order
    #[arg(short, long)]
    pub sort: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let store = GlobalConfig::from_file_and_args(global_args)?.store()?;

    let mut paths = store.list().await?;
    if args.sort {
        paths.sort();
    }
    for p in paths {
        println!("{}", p);
    }
    Ok(())
}
