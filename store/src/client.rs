use std::{
    collections::HashSet,
    ffi::OsString,
    io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt as _, process::Command};

use crate::{
    entry::Entry,
    env::StoreEnv,
    error::*,
    policy::{GenerationPolicy, PolicyOverrides},
    ENTRY_EXTENSION,
};

/// Strip a leading `/` and a trailing `.gpg` so that user input and
/// store listings compare equal.
///
/// ```
/// use passupd_store::normalize_entry_path;
///
/// assert_eq!(normalize_entry_path("/finance/bank.gpg"), "finance/bank");
/// assert_eq!(normalize_entry_path("finance/bank"), "finance/bank");
/// ```
pub fn normalize_entry_path(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    path.strip_suffix(".gpg").unwrap_or(path)
}

/// Set of every entry path in a store, built from a single traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreIndex(HashSet<String>);

impl StoreIndex {
    pub fn new(paths: impl IntoIterator<Item = String>) -> Self {
        Self(paths.into_iter().collect())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(self::normalize_entry_path(path))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    pub length: Option<NonZeroUsize>,
    pub in_place: bool,
    pub no_symbols: bool,
    pub clip: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    pub recursive: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    pub multiline: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowOptions {
    /// Copy the given line to the clipboard instead of printing.
    pub clip: Option<NonZeroUsize>,
    /// Render the given line as a QR code.
    pub qrcode: Option<NonZeroUsize>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Every entry path, without the `.gpg` extension, in traversal order.
    async fn list(&self) -> Result<Vec<String>>;

    async fn index(&self) -> Result<StoreIndex> {
        Ok(StoreIndex::new(self.list().await?))
    }

    /// Subset of `candidates` present in the store, in input order.
    async fn find(&self, candidates: &[String]) -> Result<Vec<String>> {
        let index = self.index().await?;
        Ok(candidates
            .iter()
            .filter(|path| index.contains(path))
            .cloned()
            .collect())
    }

    /// Decrypted content of the entry.
    async fn show(&self, path: &str) -> Result<String>;

    /// Decrypt once and split into password, login and metadata.
    async fn credential(&self, path: &str) -> Result<Entry> {
        let content = self.show(path).await?;
        Ok(Entry::parse(&content))
    }

    fn generation_policy(&self, overrides: &PolicyOverrides) -> Result<GenerationPolicy>;

    /// A fresh password under the store's generation policy. Nothing is written.
    async fn generate_password(&self, overrides: &PolicyOverrides) -> Result<String> {
        self.generation_policy(overrides)?.generate()
    }

    async fn generate(&self, path: &str, opts: GenerateOptions) -> Result<String>;

    async fn remove(&self, path: &str, opts: RemoveOptions) -> Result<()>;

    async fn insert(&self, path: &str, content: &str, opts: InsertOptions) -> Result<()>;
}

fn flag(args: &mut Vec<OsString>, enabled: bool, name: &str) {
    if enabled {
        args.push(name.into());
    }
}

fn flag_with_value<T: ToString>(args: &mut Vec<OsString>, value: Option<T>, name: &str) {
    if let Some(v) = value {
        args.push(format!("{}={}", name, v.to_string()).into());
    }
}

/// [`Store`] backed by the `pass` executable.
///
/// Every operation touching secrets is delegated to `pass`; only listing and
/// lookup read the store directory directly.
#[derive(Debug, Clone)]
pub struct PasswordStore {
    binary: PathBuf,
    env: StoreEnv,
}

impl PasswordStore {
    pub const VERSION: &str = "1.7.0";
    const DEFAULT_BINARY: &str = "/usr/bin/pass";

    pub fn new(env: StoreEnv) -> Self {
        Self {
            binary: Self::DEFAULT_BINARY.into(),
            env,
        }
    }

    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn get_binary(&self) -> &Path {
        &self.binary
    }

    pub fn env(&self) -> &StoreEnv {
        &self.env
    }

    pub fn root(&self) -> &Path {
        &self.env.dir
    }

    pub fn version(&self) -> &'static str {
        Self::VERSION
    }

    async fn exec(
        &self,
        subcommand: &'static str,
        args: Vec<OsString>,
        stdin: Option<&str>,
    ) -> Result<String> {
        log::debug!(
            "Running: {} {} {:?}",
            self.binary.to_string_lossy(),
            subcommand,
            args
        );

        let mut child = Command::new(&self.binary)
            .arg(subcommand)
            .args(&args)
            .envs(self.env.to_vars())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let pipe_err = |source| Error::Pipe { subcommand, source };

        if let Some(input) = stdin {
            let mut pipe = child.stdin.take().ok_or_else(|| {
                pipe_err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "stdin was not captured",
                ))
            })?;
            pipe.write_all(input.as_bytes()).await.map_err(pipe_err)?;
            // EOF for `pass insert --multiline`
            drop(pipe);
        }

        let output = child.wait_with_output().await.map_err(pipe_err)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = [stderr.trim(), stdout.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::Command {
                subcommand,
                status: output.status,
                detail,
            });
        }

        String::from_utf8(output.stdout).map_err(|_| Error::NonUtf8Output(subcommand))
    }

    /// Initialize the store (or `subfolder`) for the given gpg ids.
    pub async fn init(&self, gpg_ids: &[String], subfolder: Option<&str>) -> Result<String> {
        let mut args = Vec::new();
        flag_with_value(&mut args, subfolder, "--path");
        args.extend(gpg_ids.iter().map(OsString::from));
        self.exec("init", args, None).await
    }

    /// Lines of decrypted entries matching `pattern`, as printed by `pass grep`.
    pub async fn grep(&self, pattern: &str) -> Result<String> {
        self.exec("grep", vec![pattern.into()], None).await
    }

    pub async fn show_with(&self, path: &str, opts: ShowOptions) -> Result<String> {
        let mut args = Vec::new();
        flag_with_value(&mut args, opts.clip, "--clip");
        flag_with_value(&mut args, opts.qrcode, "--qrcode");
        args.push(path.into());
        self.exec("show", args, None).await
    }

    pub async fn rename(&self, old_path: &str, new_path: &str, force: bool) -> Result<String> {
        let mut args = Vec::new();
        flag(&mut args, force, "--force");
        args.extend([old_path.into(), new_path.into()]);
        self.exec("mv", args, None).await
    }

    pub async fn copy(&self, old_path: &str, new_path: &str, force: bool) -> Result<String> {
        let mut args = Vec::new();
        flag(&mut args, force, "--force");
        args.extend([old_path.into(), new_path.into()]);
        self.exec("cp", args, None).await
    }
}

#[async_trait]
impl Store for PasswordStore {
    async fn list(&self) -> Result<Vec<String>> {
        let files = fsutil::visible_files(self.root())?;
        Ok(files
            .iter()
            .filter_map(|p| fsutil::slash_path_without_extension(p, ENTRY_EXTENSION))
            .collect())
    }

    async fn show(&self, path: &str) -> Result<String> {
        self.show_with(path, ShowOptions::default()).await
    }

    fn generation_policy(&self, overrides: &PolicyOverrides) -> Result<GenerationPolicy> {
        GenerationPolicy::resolve(&self.env, overrides)
    }

    async fn generate(&self, path: &str, opts: GenerateOptions) -> Result<String> {
        let mut args = Vec::new();
        flag(&mut args, opts.in_place, "--in-place");
        flag(&mut args, opts.no_symbols, "--no-symbols");
        flag(&mut args, opts.clip, "--clip");
        flag(&mut args, opts.force, "--force");
        args.push(path.into());
        if let Some(len) = opts.length {
            args.push(len.to_string().into());
        }
        self.exec("generate", args, None).await
    }

    async fn remove(&self, path: &str, opts: RemoveOptions) -> Result<()> {
        let mut args = Vec::new();
        flag(&mut args, opts.recursive, "--recursive");
        flag(&mut args, opts.force, "--force");
        args.push(path.into());
        self.exec("rm", args, None).await.map(|_| ())
    }

    async fn insert(&self, path: &str, content: &str, opts: InsertOptions) -> Result<()> {
        let mut args = Vec::new();
        flag(&mut args, opts.multiline, "--multiline");
        flag(&mut args, opts.force, "--force");
        args.push(path.into());

        // Without --multiline, pass reads the password and its confirmation.
        let input = if opts.multiline {
            content.to_owned()
        } else {
            let password = content.lines().next().unwrap_or_default();
            format!("{0}\n{0}\n", password)
        };
        self.exec("insert", args, Some(&input)).await.map(|_| ())
    }
}
