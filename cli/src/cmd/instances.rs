use std::path::PathBuf;

use anyhow::ensure;
use colored::Colorize as _;

use super::{GlobalArgs, SubcmdResult};
use crate::{config::GlobalConfig, util};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Directory holding the instance descriptors [default: $UPDATER_DIR]
    #[arg(long)]
    pub instances_dir: Option<PathBuf>,

    /// Load and validate every descriptor
    #[arg(long)]
    pub check: bool,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = GlobalConfig::from_file_and_args(global_args)?;
    let catalog = cfg.catalog(args.instances_dir.as_deref())?;

    let mut num_broken = 0;
    for name in catalog.names() {
        let path = catalog
            .path_of(name)
            .map(|p| util::replace_homedir_to_tilde(p).to_string_lossy().into_owned())
            .unwrap_or_default();

        if !args.check {
            println!("{}  {}", name.bold(), path.dimmed());
            continue;
        }
        match catalog.load(name) {
            Ok(_) => println!("{}  {}", name.bold(), "ok".green()),
            Err(e) => {
                num_broken += 1;
                println!("{}  {}", name.bold(), e.kind.to_string().bright_red());
            }
        }
    }

    if catalog.is_empty() {
        log::warn!("No instance found in {:?}", catalog.dir());
    }
    ensure!(num_broken == 0, "{} instance(s) are invalid", num_broken);
    Ok(())
}
