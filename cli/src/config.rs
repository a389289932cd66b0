use std::path::{Path, PathBuf};

use anyhow::{ensure, Context as _};
use passupd_core::{instance::InstanceCatalog, Config};
use passupd_store::{PasswordStore, StoreEnv};
use serde::Deserialize;

use crate::{cmd::GlobalArgs, util};

pub const APP_NAME: &str = "passupd";

/// Variables set by `pass` when it runs the updater as an extension.
#[derive(Debug, Default, Deserialize)]
struct UpdaterEnv {
    updater_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub core: Config,
    pub store_dir: Option<PathBuf>,
    pub pass_binary: PathBuf,
}

impl GlobalConfig {
    pub fn filepath(args: &GlobalArgs) -> anyhow::Result<PathBuf> {
        if let Some(path) = &args.config {
            return Ok(path.clone());
        }
        let dir = dirs::config_dir().context("Failed to get user's config dir path")?;
        Ok(dir.join(APP_NAME).join(Config::FILENAME))
    }

    pub fn from_file_and_args(args: &GlobalArgs) -> anyhow::Result<Self> {
        let path = Self::filepath(args)?;
        let core = Config::from_toml_file_or_default(&path).with_context(|| {
            format!(
                "Invalid config '{}'",
                util::replace_homedir_to_tilde(&path).to_string_lossy()
            )
        })?;
        Ok(Self::new(core).with_args(args))
    }

    fn new(core: Config) -> Self {
        let pass_binary = core.store.pass_binary.clone();
        Self {
            core,
            store_dir: None,
            pass_binary,
        }
    }

    pub fn with_args(mut self, args: &GlobalArgs) -> Self {
        let GlobalArgs {
            subcmd: _,
            config: _,
            verbose: _,
            store,
        } = args;

        store.store_dir.as_ref().map(|d| self.store_dir = Some(d.clone()));
        store.pass_binary.as_ref().map(|b| self.pass_binary = b.clone());
        self
    }

    /// The store, configured from the environment the way `pass` is.
    pub fn store(&self) -> anyhow::Result<PasswordStore> {
        let mut env = StoreEnv::from_env().context("Invalid password store environment")?;
        if let Some(dir) = &self.store_dir {
            env = env.with_dir(util::expand_tilde(dir));
        }
        ensure!(
            env.dir.is_dir(),
            "Password store not found at '{}' (set PASSWORD_STORE_DIR or --store-dir)",
            env.dir.to_string_lossy()
        );
        log::info!("Password store: {:?}", env.dir);
        Ok(PasswordStore::new(env).binary(util::expand_tilde(&self.pass_binary)))
    }

    /// `--instances-dir`, then `UPDATER_DIR`, then the config file.
    pub fn instances_dir(&self, flag: Option<&Path>) -> anyhow::Result<PathBuf> {
        let env: UpdaterEnv = envy::from_env().context("Invalid UPDATER_DIR")?;
        let dir = self::resolve_instances_dir(
            flag,
            env.updater_dir.as_deref(),
            self.core.updater.instances_dir.as_deref(),
        )
        .context(
            "No instance directory: set UPDATER_DIR, `[updater] instances_dir` or --instances-dir",
        )?;
        Ok(util::expand_tilde(dir))
    }

    pub fn catalog(&self, flag: Option<&Path>) -> anyhow::Result<InstanceCatalog> {
        let dir = self.instances_dir(flag)?;
        InstanceCatalog::open(&dir)
            .with_context(|| format!("Cannot read instance directory {:?}", dir))
    }
}

fn resolve_instances_dir<'a>(
    flag: Option<&'a Path>,
    env: Option<&'a Path>,
    file: Option<&'a Path>,
) -> Option<&'a Path> {
    flag.or(env).or(file)
}
