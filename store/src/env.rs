//! Environment handed to `pass`.
//!
//! `pass` is configured purely through environment variables. [`StoreEnv`]
//! gathers them once (with the same defaults `pass` uses) so every child
//! process receives an explicit, identical map.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::*;

static DEFAULT_STORE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/"))
        .join(".password-store")
});

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreEnv {
    #[serde(default = "StoreEnv::default_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub git: Option<PathBuf>,

    #[serde(default)]
    pub gpg_opts: Option<String>,

    #[serde(default = "StoreEnv::default_x_selection")]
    pub x_selection: String,

    #[serde(default = "StoreEnv::default_clip_time")]
    pub clip_time: u32,

    #[serde(default = "StoreEnv::default_umask")]
    pub umask: String,

    #[serde(default = "StoreEnv::default_generated_length")]
    pub generated_length: usize,

    #[serde(default = "StoreEnv::default_character_set")]
    pub character_set: String,

    #[serde(default = "StoreEnv::default_character_set_no_symbols")]
    pub character_set_no_symbols: String,

    #[serde(default)]
    pub enable_extensions: Option<String>,

    #[serde(default)]
    pub extensions_dir: Option<PathBuf>,

    #[serde(default)]
    pub signing_key: Option<String>,

    #[serde(skip)]
    pub gnupghome: Option<PathBuf>,
}

/// Variables set when running as the `pass update` extension. They take
/// precedence over the `PASSWORD_STORE_*` ones, and are ignored otherwise:
/// outside of `pass`, names like `PREFIX` mean something else.
#[derive(Debug, Default, Deserialize)]
struct ExtensionEnv {
    prefix: Option<PathBuf>,
    git_dir: Option<PathBuf>,
    x_selection: Option<String>,
    clip_time: Option<u32>,
    generated_length: Option<usize>,
    character_set: Option<String>,
    character_set_no_symbols: Option<String>,
    extensions: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct GpgEnv {
    gnupghome: Option<PathBuf>,
}

impl Default for StoreEnv {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            key: None,
            git: None,
            gpg_opts: None,
            x_selection: Self::default_x_selection(),
            clip_time: Self::default_clip_time(),
            umask: Self::default_umask(),
            generated_length: Self::default_generated_length(),
            character_set: Self::default_character_set(),
            character_set_no_symbols: Self::default_character_set_no_symbols(),
            enable_extensions: None,
            extensions_dir: None,
            signing_key: None,
            gnupghome: None,
        }
    }
}

impl StoreEnv {
    const PREFIX: &str = "PASSWORD_STORE_";

    /// Set by the `pass update` wrapper, and only there.
    pub const EXTENSION_MARKER: &str = "UPDATER_DIR";

    fn default_dir() -> PathBuf {
        DEFAULT_STORE_DIR.clone()
    }

    fn default_x_selection() -> String {
        "clipboard".to_owned()
    }

    fn default_clip_time() -> u32 {
        45
    }

    fn default_umask() -> String {
        "077".to_owned()
    }

    fn default_generated_length() -> usize {
        25
    }

    fn default_character_set() -> String {
        "[:graph:]".to_owned()
    }

    fn default_character_set_no_symbols() -> String {
        "[:alnum:]".to_owned()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<_> = vars.into_iter().collect();
        let mut env: Self = envy::prefixed(Self::PREFIX).from_iter(vars.clone())?;
        let gpg: GpgEnv = envy::from_iter(vars.clone())?;
        env.gnupghome = gpg.gnupghome;

        if vars.iter().any(|(k, _)| k == Self::EXTENSION_MARKER) {
            let ext: ExtensionEnv = envy::from_iter(vars)?;
            env.apply_extension_env(ext);
        }
        Ok(env)
    }

    fn apply_extension_env(&mut self, ext: ExtensionEnv) {
        let ExtensionEnv {
            prefix,
            git_dir,
            x_selection,
            clip_time,
            generated_length,
            character_set,
            character_set_no_symbols,
            extensions,
        } = ext;

        prefix.map(|v| self.dir = v);
        git_dir.map(|v| self.git = Some(v));
        x_selection.map(|v| self.x_selection = v);
        clip_time.map(|v| self.clip_time = v);
        generated_length.map(|v| self.generated_length = v);
        character_set.map(|v| self.character_set = v);
        character_set_no_symbols.map(|v| self.character_set_no_symbols = v);
        extensions.map(|v| self.extensions_dir = Some(v));
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// The explicit environment map handed to every `pass` invocation.
    pub fn to_vars(&self) -> Vec<(&'static str, String)> {
        fn path(p: &std::path::Path) -> String {
            p.to_string_lossy().into_owned()
        }

        let mut vars = vec![
            ("PASSWORD_STORE_DIR", path(&self.dir)),
            ("PASSWORD_STORE_X_SELECTION", self.x_selection.clone()),
            ("PASSWORD_STORE_CLIP_TIME", self.clip_time.to_string()),
            ("PASSWORD_STORE_UMASK", self.umask.clone()),
            (
                "PASSWORD_STORE_GENERATED_LENGTH",
                self.generated_length.to_string(),
            ),
            ("PASSWORD_STORE_CHARACTER_SET", self.character_set.clone()),
            (
                "PASSWORD_STORE_CHARACTER_SET_NO_SYMBOLS",
                self.character_set_no_symbols.clone(),
            ),
        ];

        let optional = [
            ("PASSWORD_STORE_KEY", self.key.clone()),
            ("PASSWORD_STORE_GIT", self.git.as_deref().map(path)),
            ("PASSWORD_STORE_GPG_OPTS", self.gpg_opts.clone()),
            (
                "PASSWORD_STORE_ENABLE_EXTENSIONS",
                self.enable_extensions.clone(),
            ),
            (
                "PASSWORD_STORE_EXTENSIONS_DIR",
                self.extensions_dir.as_deref().map(path),
            ),
            ("PASSWORD_STORE_SIGNING_KEY", self.signing_key.clone()),
            ("GNUPGHOME", self.gnupghome.as_deref().map(path)),
        ];
        vars.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );
        vars
    }
}
