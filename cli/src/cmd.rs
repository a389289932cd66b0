pub mod classify;
pub mod find;
pub mod init_config;
pub mod instances;
pub mod list;
pub mod update;

use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Config file [default: <user config dir>/passupd/passupd.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log more (-v: info, -vv: debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct StoreArgs {
    /// Password store directory [default: $PASSWORD_STORE_DIR or ~/.password-store;
    /// $PREFIX when run as `pass update`, i.e. with UPDATER_DIR set]
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// `pass` executable
    #[arg(long, global = true)]
    pub pass_binary: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    /// Rotate the passwords of the given entries
    #[command(alias("u"))]
    Update(update::Args),

    /// Show how the given entries would be updated, without touching them
    Classify(classify::Args),

    /// List every entry of the store
    #[command(alias("ls"))]
    List(list::Args),

    /// Show which of the given entries exist in the store
    Find(find::Args),

    /// List the known instances
    Instances(instances::Args),

    /// Write an example config file
    InitConfig(init_config::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Update(args) => update::exec(args, self).await,
            Classify(args) => classify::exec(args, self).await,
            List(args) => list::exec(args, self).await,
            Find(args) => find::exec(args, self).await,
            Instances(args) => instances::exec(args, self),
            InitConfig(args) => init_config::exec(args, self),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn parse_update() {
        let args = GlobalArgs::try_parse_from([
            "passupd",
            "-vv",
            "update",
            "web/example",
            "mail/work",
            "--browser",
            "form",
            "--store-dir",
            "/tmp/store",
            "--show-browser",
        ])
        .unwrap();

        assert_eq!(args.verbose, 2);
        assert_eq!(args.store.store_dir, Some(PathBuf::from("/tmp/store")));
        let Subcommand::Update(update) = args.subcmd else {
            panic!("expected update: {:?}", args.subcmd);
        };
        assert_eq!(update.paths, vec!["web/example", "mail/work"]);
        assert_eq!(update.browser, Some(passupd_webclient::Browser::Form));
        assert!(update.show_browser);
    }

    #[test]
    fn update_needs_paths() {
        assert!(GlobalArgs::try_parse_from(["passupd", "update"]).is_err());
        assert!(GlobalArgs::try_parse_from(["passupd", "update", "--browser", "lynx", "a"]).is_err());
    }
}
