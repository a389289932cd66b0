use std::path::PathBuf;

use passupd_core::{action, style::ConsoleReporter};

use super::{GlobalArgs, SubcmdResult};
use crate::config::GlobalConfig;

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(required = true)] // positional argument
    pub paths: Vec<String>,

    /// Directory holding the instance descriptors [default: $UPDATER_DIR]
    #[arg(long)]
    pub instances_dir: Option<PathBuf>,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = GlobalConfig::from_file_and_args(global_args)?;
    let store = cfg.store()?;
    let catalog = cfg.catalog(args.instances_dir.as_deref())?;

    let c = action::classify_paths(&store, &catalog, &args.paths).await?;
    action::report_classification(&c, &ConsoleReporter);

    if !c.invalid.is_empty() {
        log::warn!("{} entries cannot be updated at all", c.invalid.len());
    }
    Ok(())
}
