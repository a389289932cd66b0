//! Writing a rotated password back into the store.

use passupd_store::{InsertOptions, RemoveOptions, Store};

use crate::style::Reporter;

pub const SIDE_BY_SIDE_SUFFIX: &str = ".new";

/// Replace the first line of `content`, keeping the rest byte for byte.
///
/// ```
/// use passupd_core::rotate::splice_password;
///
/// assert_eq!(
///     splice_password("oldpass\nlogin bob\nkey: v\n", "newpass"),
///     "newpass\nlogin bob\nkey: v\n",
/// );
/// ```
pub fn splice_password(content: &str, new_password: &str) -> String {
    match content.split_once('\n') {
        Some((_, rest)) => format!("{}\n{}", new_password, rest),
        None => format!("{}\n", new_password),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverwriteOutcome {
    /// The entry now holds the new password.
    Replaced,
    /// The old entry is untouched; the new content lives at `path`.
    SideBySide { path: String },
}

#[derive(thiserror::Error, Debug)]
#[error("Unable to insert {path} in the password store")]
pub struct OverwriteError {
    pub path: String,
    #[source]
    pub source: passupd_store::Error,
}

/// Store `new_password` as the first line of the entry at `path`.
///
/// The old entry is only removed when its content could be read. If removal
/// fails, the new content goes to `<path>.new` instead. If the final insert
/// fails, the new content is handed to the reporter so it is not lost.
pub async fn overwrite<S: Store + ?Sized>(
    store: &S,
    path: &str,
    new_password: &str,
    reporter: &dyn Reporter,
) -> Result<OverwriteOutcome, OverwriteError> {
    let side_path = format!("{}{}", path, SIDE_BY_SIDE_SUFFIX);

    let (target, new_content) = match store.show(path).await {
        Ok(content) => {
            let new_content = self::splice_password(&content, new_password);
            let removed = store
                .remove(
                    path,
                    RemoveOptions {
                        recursive: false,
                        force: true,
                    },
                )
                .await;
            match removed {
                Ok(()) => (path.to_owned(), new_content),
                Err(e) => {
                    log::warn!("Cannot remove {}: {}", path, e);
                    reporter.warning(&format!(
                        "Unable to remove {}, writing new password in {}",
                        path, side_path
                    ));
                    (side_path, new_content)
                }
            }
        }
        Err(e) => {
            log::warn!("Cannot read {} back: {}", path, e);
            reporter.warning(&format!(
                "Unable to read {}, writing new password in {}",
                path, side_path
            ));
            (side_path, format!("{}\n", new_password))
        }
    };

    self::insert_or_reveal(store, &target, &new_content, reporter).await?;
    if target == path {
        Ok(OverwriteOutcome::Replaced)
    } else {
        Ok(OverwriteOutcome::SideBySide { path: target })
    }
}

/// Keep `new_password` at `<path>.new` without touching the entry itself.
/// Used when a site may have taken the password but the flow did not finish.
/// Returns the path written to.
pub async fn save_side_by_side<S: Store + ?Sized>(
    store: &S,
    path: &str,
    new_password: &str,
    reporter: &dyn Reporter,
) -> Result<String, OverwriteError> {
    let side_path = format!("{}{}", path, SIDE_BY_SIDE_SUFFIX);
    let new_content = match store.show(path).await {
        Ok(content) => self::splice_password(&content, new_password),
        Err(e) => {
            log::warn!("Cannot read {} back: {}", path, e);
            format!("{}\n", new_password)
        }
    };
    self::insert_or_reveal(store, &side_path, &new_content, reporter).await?;
    Ok(side_path)
}

async fn insert_or_reveal<S: Store + ?Sized>(
    store: &S,
    target: &str,
    new_content: &str,
    reporter: &dyn Reporter,
) -> Result<(), OverwriteError> {
    let opts = InsertOptions {
        multiline: true,
        force: false,
    };
    store.insert(target, new_content, opts).await.map_err(|source| {
        reporter.warning(&format!(
            "Unable to insert {} in the password repository.",
            target
        ));
        reporter.warning("The content is the following:");
        reporter.message(new_content);
        OverwriteError {
            path: target.to_owned(),
            source,
        }
    })
}
