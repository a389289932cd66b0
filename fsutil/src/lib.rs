use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use walkdir::{DirEntry, WalkDir};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("Cannot traverse dir '{0}': {1}")]
        Walk(PathBuf, #[source] walkdir::Error),

        #[error("Not a directory: '{0}'")]
        NotADirectory(PathBuf),
    }
}
use error::*;

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

/// Whether the file name starts with a dot.
///
/// ```
/// use fsutil::is_hidden_name;
/// use std::ffi::OsStr;
///
/// assert!(is_hidden_name(OsStr::new(".gpg-id")));
/// assert!(is_hidden_name(OsStr::new(".git")));
/// assert!(!is_hidden_name(OsStr::new("github.gpg")));
/// ```
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_visible(entry: &DirEntry) -> bool {
    // The root itself may be hidden (e.g. `~/.password-store`)
    entry.depth() == 0 || !self::is_hidden_name(entry.file_name())
}

/// Recursively collects regular files below `root`, skipping hidden files and
/// never descending into hidden dirs.
/// Returned paths are relative to `root`, in traversal order.
#[must_use]
pub fn visible_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::NotADirectory(root.to_owned()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(is_visible) {
        let entry = entry.map_err(|e| Error::Walk(root.to_owned(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.path().strip_prefix(root) {
            Ok(rel) => files.push(rel.to_owned()),
            Err(_) => log::warn!("Skipping entry outside of {:?}: {:?}", root, entry.path()),
        }
    }
    Ok(files)
}

/// Render a relative path with `/` separators and without the given extension.
///
/// ```
/// use fsutil::slash_path_without_extension;
/// use std::path::Path;
///
/// let p = slash_path_without_extension(Path::new("finance/bank.gpg"), "gpg");
/// assert_eq!(p.as_deref(), Some("finance/bank"));
///
/// assert_eq!(slash_path_without_extension(Path::new("notes.txt"), "gpg"), None);
/// ```
pub fn slash_path_without_extension(path: &Path, extension: &str) -> Option<String> {
    if path.extension() != Some(OsStr::new(extension)) {
        return None;
    }
    let stripped = path.with_extension("");
    let parts: Vec<_> = stripped
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}

/// Expand a leading `~` to the user's home dir.
pub fn expand_tilde(path: impl AsRef<Path>, home: Option<&Path>) -> PathBuf {
    let path = path.as_ref();
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_owned(),
    }
}
