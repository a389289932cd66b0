use anyhow::ensure;
use passupd_store::Store as _;

use super::{GlobalArgs, SubcmdResult};
use crate::config::GlobalConfig;

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(required = true)] // positional argument
    pub paths: Vec<String>,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let store = GlobalConfig::from_file_and_args(global_args)?.store()?;

    let found = store.find(&args.paths).await?;
    for p in &found {
        println!("{}", p);
    }

    let missing: Vec<_> = args.paths.iter().filter(|p| !found.contains(p)).collect();
    for p in &missing {
        log::warn!("{} is not in the password store", p);
    }
    ensure!(!found.is_empty(), "None of the given entries is in the store");
    Ok(())
}
