use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::Context as _;
use passupd_webclient::{Browser, SessionOptions, Url};
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::sequencer::SequencerOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub store: StoreConfig,
    pub updater: UpdaterConfig,
    pub browser: BrowserConfig,
    pub sequencer: SequencerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub pass_binary: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pass_binary: "/usr/bin/pass".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterConfig {
    pub instances_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    pub kind: Browser,
    pub headless: bool,
    pub webdriver_url: Url,
}

impl BrowserConfig {
    pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            browser: self.kind,
            headless: self.headless,
            webdriver_url: self.webdriver_url.clone(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: Browser::Firefox,
            headless: true,
            webdriver_url: Url::parse(Self::DEFAULT_WEBDRIVER_URL)
                .expect("Failed to parse the default WebDriver url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SequencerConfig {
    pub title_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        let d = SequencerOptions::default();
        Self {
            title_timeout_secs: d.title_timeout.as_secs(),
            settle_delay_ms: d.settle_delay.as_millis() as u64,
            poll_interval_ms: d.poll_interval.as_millis() as u64,
        }
    }
}

impl SequencerConfig {
    pub fn options(&self) -> SequencerOptions {
        SequencerOptions {
            title_timeout: Duration::from_secs(self.title_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "passupd.toml";

    pub fn example_toml() -> String {
        Asset::get(Self::FILENAME)
            .map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
            .unwrap_or_default()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Defaults when `filepath` does not exist. A file that exists but does
    /// not parse is an error.
    pub fn from_toml_file_or_default(filepath: impl AsRef<Path>) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        if !filepath.exists() {
            log::debug!("No config file at {:?}, using defaults", filepath);
            return Ok(Self::default());
        }
        Self::from_toml_file(filepath.to_owned())
    }

    /// Write the example config, refusing to clobber an existing file.
    pub fn write_example(filepath: impl AsRef<Path>) -> anyhow::Result<()> {
        let filepath = filepath.as_ref();
        anyhow::ensure!(
            !filepath.exists(),
            "Config file already exists: {:?}",
            filepath
        );
        fsutil::write_with_mkdir(filepath, Self::example_toml())?;
        Ok(())
    }
}
