use passupd_core::{print_success, Config};

use super::{GlobalArgs, SubcmdResult};
use crate::{config::GlobalConfig, util};

#[derive(Debug, clap::Args)]
pub struct Args {}

pub fn exec(_args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let path = GlobalConfig::filepath(global_args)?;
    Config::write_example(&path)?;
    print_success!(
        "Successfully wrote example config. (path: {})",
        util::replace_homedir_to_tilde(&path).to_string_lossy()
    );
    Ok(())
}
