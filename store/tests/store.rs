use std::{fs, num::NonZeroUsize, path::Path};

use passupd_store::*;
use tempfile::TempDir;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "encrypted").unwrap();
}

fn sample_store() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, ".gpg-id");
    touch(root, ".git/config");
    touch(root, "github.gpg");
    touch(root, "email/work.gpg");
    touch(root, "email/personal.gpg");
    touch(root, "finance/bank.gpg");
    touch(root, "finance/.hidden.gpg");
    touch(root, "notes.txt");
    dir
}

fn store_at(root: &Path) -> PasswordStore {
    PasswordStore::new(StoreEnv::default().with_dir(root))
}

#[tokio::test]
async fn list_skips_hidden_and_strips_extension() {
    let dir = sample_store();
    let store = store_at(dir.path());

    let mut paths = store.list().await.unwrap();
    paths.sort();
    assert_eq!(
        paths,
        vec!["email/personal", "email/work", "finance/bank", "github"]
    );
}

#[tokio::test]
async fn find_keeps_candidate_order() {
    let dir = sample_store();
    let store = store_at(dir.path());

    let candidates: Vec<String> = [
        "github",
        "email/unknown",
        "finance/bank.gpg",
        "email/work",
        "finance/.hidden",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let found = store.find(&candidates).await.unwrap();
    assert_eq!(found, vec!["github", "finance/bank.gpg", "email/work"]);
}

#[tokio::test]
async fn list_fails_without_store_dir() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir.path().join("missing"));
    assert!(matches!(store.list().await, Err(Error::Fs(_))));
}

#[cfg(unix)]
mod process {
    use super::*;
    use once_cell::sync::Lazy;
    use std::{os::unix::fs::PermissionsExt, path::PathBuf};

    /// Stand-in for `pass`. Logs every call into `$PASSWORD_STORE_DIR/.calls`.
    const FAKE_PASS: &str = r#"#!/bin/sh
sub="$1"; shift
echo "$sub $*" >> "$PASSWORD_STORE_DIR/.calls"
case "$sub" in
  show)
    for last in "$@"; do :; done
    case "$last" in
      finance/bank) echo "gpg: decryption failed" >&2; exit 1 ;;
    esac
    printf 'hunter2\nlogin: bob\nurl: https://example.com\n'
    ;;
  insert)
    cat > "$PASSWORD_STORE_DIR/.stdin"
    ;;
  rm)
    for last in "$@"; do :; done
    case "$last" in
      locked/*) echo "rm: cannot remove '$last': Permission denied"; exit 1 ;;
    esac
    ;;
  generate)
    echo "The generated password is: Zx81"
    ;;
esac
"#;

    // Written once, before any test spawns it.
    static FAKE_PASS_BIN: Lazy<(TempDir, PathBuf)> = Lazy::new(|| {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("pass");
        fs::write(&bin, FAKE_PASS).unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();
        (dir, bin)
    });

    fn fake_store() -> (TempDir, PasswordStore) {
        let dir = sample_store();
        let store = store_at(dir.path()).binary(&FAKE_PASS_BIN.1);
        (dir, store)
    }

    fn calls(dir: &TempDir) -> Vec<String> {
        fs::read_to_string(dir.path().join(".calls"))
            .unwrap_or_default()
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn credential_is_decrypted_once_and_split() {
        let (dir, store) = fake_store();

        let entry = store.credential("github").await.unwrap();
        assert_eq!(entry.password, "hunter2");
        assert_eq!(entry.login.as_deref(), Some("bob"));
        assert_eq!(entry.metadata.get_str("url"), Some("https://example.com"));
        assert_eq!(calls(&dir), vec!["show github"]);
    }

    #[tokio::test]
    async fn failing_show_surfaces_process_output() {
        let (_dir, store) = fake_store();

        let err = store.credential("finance/bank").await.unwrap_err();
        match &err {
            Error::Command {
                subcommand, detail, ..
            } => {
                assert_eq!(*subcommand, "show");
                assert!(detail.contains("gpg: decryption failed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("gpg: decryption failed"));
    }

    #[tokio::test]
    async fn generate_passes_flags_then_path_then_length() {
        let (dir, store) = fake_store();

        let out = store
            .generate(
                "email/work",
                GenerateOptions {
                    length: NonZeroUsize::new(16),
                    in_place: true,
                    no_symbols: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(out.contains("Zx81"));
        assert_eq!(
            calls(&dir),
            vec!["generate --in-place --no-symbols email/work 16"]
        );
    }

    #[tokio::test]
    async fn insert_feeds_content_on_stdin() {
        let (dir, store) = fake_store();
        let content = "newpass\nlogin: bob\nkey: v\n";

        store
            .insert(
                "github",
                content,
                InsertOptions {
                    multiline: true,
                    force: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(calls(&dir), vec!["insert --multiline github"]);
        assert_eq!(
            fs::read_to_string(dir.path().join(".stdin")).unwrap(),
            content
        );

        store
            .insert("email/work", content, InsertOptions::default())
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(".stdin")).unwrap(),
            "newpass\nnewpass\n"
        );
    }

    #[tokio::test]
    async fn remove_reports_failure() {
        let (dir, store) = fake_store();
        let force = RemoveOptions {
            recursive: false,
            force: true,
        };

        store.remove("github", force).await.unwrap();
        let err = store.remove("locked/site", force).await.unwrap_err();

        assert!(err.to_string().contains("Permission denied"));
        assert_eq!(
            calls(&dir),
            vec!["rm --force github", "rm --force locked/site"]
        );
    }

    #[tokio::test]
    async fn pass_through_commands() {
        let (dir, store) = fake_store();

        store.rename("github", "code/github", true).await.unwrap();
        store.copy("email/work", "email/work-old", false).await.unwrap();
        store
            .show_with(
                "github",
                ShowOptions {
                    clip: NonZeroUsize::new(2),
                    qrcode: None,
                },
            )
            .await
            .unwrap();
        store
            .init(&["ABCD1234".to_owned()], Some("email"))
            .await
            .unwrap();

        assert_eq!(
            calls(&dir),
            vec![
                "mv --force github code/github",
                "cp email/work email/work-old",
                "show --clip=2 github",
                "init --path=email ABCD1234",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = sample_store();
        let store = store_at(dir.path()).binary(dir.path().join("no-such-pass"));
        assert!(matches!(
            store.show("github").await,
            Err(Error::Spawn { .. })
        ));
    }
}
